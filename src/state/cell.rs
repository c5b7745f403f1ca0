//! StateCell - one namespace's value, persistence setting and subscribers
//!
//! A cell is created once per namespace by the registry and lives for the rest
//! of the process. Updates write the value, mirror it into storage when the
//! namespace is persistent, then notify every subscriber synchronously.
//!
//! # Atomicity
//!
//! `update` holds the cell's re-entrant gate for the whole sequence (value
//! write, storage write, notification loop), so two updates on the same cell
//! never interleave. Value and subscriber locks are released before callbacks
//! run; a subscriber may read the cell or update it again from its callback.
//!
//! A nested update (one made from inside a callback) stores and persists its
//! value at once but queues the notification. The outermost `update` delivers
//! queued values in order after the current round, so every subscriber's last
//! notification matches the cell's final value.

use super::types::{StateValue, StoreOptions, Subscriber};
use crate::storage::{storage_key, Storage};
use parking_lot::{ReentrantMutex, RwLock};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub struct StateCell<T> {
    namespace: String,
    options: StoreOptions,
    key: String,
    storage: Arc<dyn Storage>,
    gate: ReentrantMutex<RefCell<Delivery<T>>>,
    value: RwLock<T>,
    subscribers: RwLock<Vec<Subscriber<T>>>,
}

/// Notification state, only touched while the gate is held
struct Delivery<T> {
    in_progress: bool,
    pending: VecDeque<T>,
}

/// Ends a delivery run even if a subscriber panics
struct DeliveryRun<'a, T>(&'a RefCell<Delivery<T>>);

impl<T> Drop for DeliveryRun<'_, T> {
    fn drop(&mut self) {
        let mut delivery = self.0.borrow_mut();
        delivery.in_progress = false;
        delivery.pending.clear();
    }
}

impl<T: StateValue> StateCell<T> {
    /// Create a cell, seeding it from storage when `options.persist` is set
    ///
    /// Any read failure (missing entry, backend error, undecodable text) falls
    /// back to `initial`, which is then written through so storage matches.
    pub(crate) fn new(
        initial: T,
        namespace: impl Into<String>,
        options: StoreOptions,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let namespace = namespace.into();
        let key = storage_key(&namespace);

        let cell = Self {
            namespace,
            options,
            key,
            storage,
            gate: ReentrantMutex::new(RefCell::new(Delivery {
                in_progress: false,
                pending: VecDeque::new(),
            })),
            value: RwLock::new(initial),
            subscribers: RwLock::new(Vec::new()),
        };

        if cell.options.persist {
            match cell.load_persisted() {
                Some(stored) => *cell.value.write() = stored,
                None => {
                    let initial = cell.value.read().clone();
                    cell.write_persisted(&initial);
                }
            }
        }

        debug!(
            "Created state cell '{}' (persist: {})",
            cell.namespace, cell.options.persist
        );
        cell
    }

    /// Replace the value, persist it if configured and notify subscribers
    ///
    /// Called from inside a subscriber of this cell, the notification is
    /// queued and delivered by the outer `update` before it returns.
    pub fn update(&self, new_value: T) {
        let gate = self.gate.lock();

        *self.value.write() = new_value.clone();

        if self.options.persist {
            self.write_persisted(&new_value);
        }

        {
            let mut delivery = gate.borrow_mut();
            if delivery.in_progress {
                trace!("Queued nested update of '{}'", self.namespace);
                delivery.pending.push_back(new_value);
                return;
            }
            delivery.in_progress = true;
        }
        let _run = DeliveryRun(&*gate);

        let mut next = Some(new_value);
        while let Some(value) = next {
            // Snapshot so callbacks may (un)subscribe without deadlocking
            let subscribers: Vec<Subscriber<T>> = self.subscribers.read().clone();
            trace!(
                "Notifying {} subscriber(s) of '{}'",
                subscribers.len(),
                self.namespace
            );
            for subscriber in &subscribers {
                subscriber(&value);
            }
            next = gate.borrow_mut().pending.pop_front();
        }
    }

    /// Register a subscriber unless this exact subscriber is already present
    ///
    /// Returns `true` if it was added.
    pub fn subscribe(&self, subscriber: &Subscriber<T>) -> bool {
        let mut subscribers = self.subscribers.write();
        if subscribers.iter().any(|s| Arc::ptr_eq(s, subscriber)) {
            return false;
        }
        subscribers.push(Arc::clone(subscriber));
        true
    }

    /// Remove every registration of `subscriber`
    ///
    /// Returns `true` if anything was removed.
    pub fn unsubscribe(&self, subscriber: &Subscriber<T>) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| !Arc::ptr_eq(s, subscriber));
        subscribers.len() != before
    }

    /// Current value (cloned)
    pub fn value(&self) -> T {
        self.value.read().clone()
    }

    /// Run `f` against the current value without cloning it
    ///
    /// The value stays read-locked while `f` runs: `f` must not call
    /// [`update`](Self::update) on this cell (it would deadlock). Use
    /// [`value`](Self::value) when the closure needs to write back.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn is_persistent(&self) -> bool {
        self.options.persist
    }

    /// Key this cell uses in durable storage
    pub fn storage_key(&self) -> &str {
        &self.key
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn load_persisted(&self) -> Option<T> {
        let text = match self.storage.get(&self.key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(
                    "{} not found in storage, using initial value",
                    self.key
                );
                return None;
            }
            Err(e) => {
                warn!(
                    "Failed to read {} from storage (using initial value): {}",
                    self.key, e
                );
                return None;
            }
        };

        match serde_json::from_str::<T>(&text) {
            Ok(value) => {
                debug!("{} restored from storage", self.key);
                Some(value)
            }
            Err(e) => {
                warn!(
                    "Failed to decode stored value for {} (using initial value): {}",
                    self.key, e
                );
                None
            }
        }
    }

    fn write_persisted(&self, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode value for {}: {}", self.key, e);
                return;
            }
        };

        match self.storage.set(&self.key, &json) {
            Ok(()) => trace!("Persisted {}", self.key),
            Err(e) => warn!("Failed to persist {}: {}", self.key, e),
        }
    }
}

impl<T> std::fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell")
            .field("namespace", &self.namespace)
            .field("options", &self.options)
            .field("subscribers", &self.subscribers.read().len())
            .finish_non_exhaustive()
    }
}
