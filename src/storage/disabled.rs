//! Storage that refuses every operation
//!
//! Stands in for a host where durable storage is turned off or full. State
//! cells keep working in memory on top of it.

use super::Storage;
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStorage;

impl Storage for DisabledStorage {
    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(StorageError::Unavailable("storage is disabled".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("storage is disabled".to_string()))
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("storage is disabled".to_string()))
    }
}
