//! Shared state type definitions
//!
//! Options accepted when a namespace is first referenced, the subscriber
//! callback type, and the bound every stored value must satisfy.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-namespace configuration, fixed when the cell is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Mirror the value into durable storage and seed from it on creation
    #[serde(default)]
    pub persist: bool,
}

impl StoreOptions {
    /// Options for a namespace backed by durable storage
    pub fn persistent() -> Self {
        Self { persist: true }
    }
}

/// Callback invoked with the new value after every update
///
/// Identity is the `Arc` allocation: clones of the same `Subscriber` are the
/// same subscriber, two separately wrapped closures are not.
pub type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Wrap a closure into a [`Subscriber`]
pub fn subscriber<T, F>(callback: F) -> Subscriber<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Values that can live in a state cell
///
/// JSON encoding is only exercised for persistent namespaces.
pub trait StateValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> StateValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
