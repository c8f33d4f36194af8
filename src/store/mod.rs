//! Persistence of info records
//!
//! Each subscription row holds one JSON column per mode. The pipeline reads
//! and writes whole objects; there is no locking, so concurrent writers to
//! the same record race and the last write wins.

mod memory;
mod postgrest;

pub use memory::MemoryInfoStore;
pub use postgrest::PostgrestInfoStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::info::Mode;

#[async_trait]
pub trait InfoStore: Send + Sync {
    /// Stored object for `record_id`, or `None` when nothing is stored
    async fn get_info(&self, record_id: &str, mode: Mode) -> Result<Option<Value>, StoreError>;

    /// Overwrite the stored object for `record_id`
    async fn set_info(&self, record_id: &str, mode: Mode, info: &Value) -> Result<(), StoreError>;
}

/// Column holding the record for `mode`
pub fn info_column(mode: Mode) -> &'static str {
    match mode {
        Mode::Cancellation => "cancellation_info",
        Mode::Registration => "registration_info",
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Missing store configuration: {0}")]
    MissingConfig(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Failed to decode stored value: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Http(err.to_string())
    }
}
