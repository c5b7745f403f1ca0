//! Durable key-value storage backends
//!
//! State cells mirror persistent namespaces into a [`Storage`] implementation
//! under the key `KEY_PREFIX + namespace`. All calls are synchronous; any
//! failure is reported as a [`StorageError`] and handled by the caller.

mod disabled;
mod memory;
mod sled_backend;

pub use disabled::DisabledStorage;
pub use memory::MemoryStorage;
pub use sled_backend::SledStorage;

use crate::error::StorageResult;

/// Tag prepended to every namespace so entries don't collide with unrelated
/// keys sharing the same backend
pub const KEY_PREFIX: &str = "[shared-store]";

/// Build the storage key for a namespace
pub fn storage_key(namespace: &str) -> String {
    format!("{}{}", KEY_PREFIX, namespace)
}

/// Synchronous string key-value store
pub trait Storage: Send + Sync {
    /// Read the text stored under `key`, `Ok(None)` if nothing is stored
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous entry
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> StorageResult<()>;
}
