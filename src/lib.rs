//! Shared Store - namespaced shared state with optional persistence
//!
//! Independent consumers read and update the same value by referring to the
//! same namespace. Every update is pushed synchronously to all subscribers of
//! that namespace, and persistent namespaces are mirrored into a key-value
//! [`storage`] backend so they survive a restart.
//!
//! ```ignore
//! use shared_store::state::{StateRegistry, StoreOptions};
//! use shared_store::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let registry: StateRegistry<i64> = StateRegistry::new(Arc::new(MemoryStorage::new()));
//! let binding = registry.bind("count", 0, StoreOptions::default(), |v| println!("count = {v}"))?;
//! binding.setter().set(5);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod paths;
pub mod state;
pub mod storage;

pub use error::{Result, StorageError, StoreError};
pub use state::{StateCell, StateRegistry, StoreOptions};
