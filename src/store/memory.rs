use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{InfoStore, StoreError};
use crate::info::Mode;

/// Process-local store keyed by `(record_id, mode)`
#[derive(Debug, Default)]
pub struct MemoryInfoStore {
    records: DashMap<(String, Mode), Value>,
}

impl MemoryInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl InfoStore for MemoryInfoStore {
    async fn get_info(&self, record_id: &str, mode: Mode) -> Result<Option<Value>, StoreError> {
        Ok(self
            .records
            .get(&(record_id.to_string(), mode))
            .map(|entry| entry.value().clone()))
    }

    async fn set_info(&self, record_id: &str, mode: Mode, info: &Value) -> Result<(), StoreError> {
        self.records
            .insert((record_id.to_string(), mode), info.clone());
        Ok(())
    }
}
