//! Process-wide shared registry
//!
//! Most code should own a [`StateRegistry`] and pass it around. For consumers
//! that need a namespace reachable without explicit wiring, a single
//! JSON-valued registry lives here for the lifetime of the process.
//!
//! Install a durable backend once at startup with [`install_shared`]; if
//! nothing is installed the first call to [`shared`] creates one on top of
//! [`MemoryStorage`].

use super::registry::StateRegistry;
use crate::storage::{MemoryStorage, Storage};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};

static SHARED: OnceCell<StateRegistry> = OnceCell::new();

/// The process-wide registry
pub fn shared() -> &'static StateRegistry {
    SHARED.get_or_init(|| {
        info!("Shared state registry created with in-memory storage");
        StateRegistry::new(Arc::new(MemoryStorage::new()))
    })
}

/// Create the process-wide registry on top of `storage`
///
/// Returns `false` (and leaves the existing registry in place) if it was
/// already created.
pub fn install_shared(storage: Arc<dyn Storage>) -> bool {
    let installed = SHARED.set(StateRegistry::new(storage)).is_ok();
    if !installed {
        warn!("Shared state registry already initialized, keeping existing storage");
    }
    installed
}
