//! Browser infrastructure for launching and tearing down Chrome instances
//!
//! Every search owns its own browser process. There is no shared manager:
//! a session is launched, used, and closed within one call.

mod wrapper;

pub use wrapper::{BrowserSession, with_session};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Navigation timeout after {timeout_ms}ms for URL: {url}")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Element not found (timeout after {timeout_ms}ms): '{selector}'")]
    SelectorTimeout { selector: String, timeout_ms: u64 },

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;
