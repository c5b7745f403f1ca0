//! Consumer bindings
//!
//! A [`Binding`] is what a UI component (or any other consumer) holds while it
//! is mounted: it keeps a change trigger subscribed to one namespace and hands
//! out a [`Setter`] for that namespace. Dropping the binding unsubscribes the
//! trigger, nothing else.

use super::cell::StateCell;
use super::types::{StateValue, Subscriber};
use std::sync::Arc;
use tracing::trace;

pub struct Binding<T: StateValue> {
    cell: Arc<StateCell<T>>,
    trigger: Subscriber<T>,
}

impl<T: StateValue> Binding<T> {
    pub(crate) fn attach(cell: Arc<StateCell<T>>, trigger: Subscriber<T>) -> Self {
        cell.subscribe(&trigger);
        trace!("Bound consumer to '{}'", cell.namespace());
        Self { cell, trigger }
    }

    /// Current value of the bound namespace
    pub fn value(&self) -> T {
        self.cell.value()
    }

    /// Handle that updates the bound namespace
    ///
    /// Every setter obtained for the same namespace targets the same cell.
    pub fn setter(&self) -> Setter<T> {
        Setter {
            cell: Arc::clone(&self.cell),
        }
    }

    pub fn namespace(&self) -> &str {
        self.cell.namespace()
    }
}

impl<T: StateValue> Drop for Binding<T> {
    fn drop(&mut self) {
        self.cell.unsubscribe(&self.trigger);
        trace!("Unbound consumer from '{}'", self.cell.namespace());
    }
}

/// Stable update handle for one namespace
pub struct Setter<T> {
    cell: Arc<StateCell<T>>,
}

impl<T: StateValue> Setter<T> {
    /// Update the namespace and notify all of its subscribers
    pub fn set(&self, value: T) {
        self.cell.update(value);
    }

    /// Whether both setters update the same namespace
    pub fn same_target(&self, other: &Setter<T>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}
