//! Error types for the shared store
//!
//! Only [`StoreError`] ever reaches a caller. [`StorageError`] is produced by
//! storage backends and absorbed inside the state cells.

use thiserror::Error;

/// Errors surfaced by the registry and bindings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A namespace identifier was empty
    #[error("no namespace provided to the shared store (a non-empty namespace is required)")]
    InvalidNamespace,
}

/// Failures reported by a [`Storage`](crate::storage::Storage) backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend is turned off or unreachable
    #[error("storage is unavailable: {0}")]
    Unavailable(String),

    /// Embedded database error
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// A stored value was not valid UTF-8 text
    #[error("stored value under '{key}' is not valid UTF-8")]
    InvalidText { key: String },
}

/// Result alias for registry operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Result alias for storage backends
pub type StorageResult<T> = std::result::Result<T, StorageError>;
