//! StateRegistry - namespace to StateCell mapping
//!
//! Cells are created lazily on first reference and never removed; only the
//! persisted entry behind a namespace can be cleared.

use super::binding::Binding;
use super::cell::StateCell;
use super::types::{StateValue, StoreOptions, Subscriber};
use crate::error::{Result, StoreError};
use crate::storage::{storage_key, Storage};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Owns every state cell of one value type, keyed by namespace
pub struct StateRegistry<T = serde_json::Value> {
    storage: Arc<dyn Storage>,
    cells: DashMap<String, Arc<StateCell<T>>>,
}

impl<T: StateValue> StateRegistry<T> {
    /// Create an empty registry whose persistent cells use `storage`
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            cells: DashMap::new(),
        }
    }

    /// Return the cell for `namespace`, creating it if needed
    ///
    /// When the cell already exists, `initial` and `options` are ignored.
    pub fn get_or_create(
        &self,
        namespace: &str,
        initial: T,
        options: StoreOptions,
    ) -> Result<Arc<StateCell<T>>> {
        validate_namespace(namespace)?;

        if let Some(cell) = self.get(namespace) {
            return Ok(cell);
        }

        let cell = self
            .cells
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(self.create_cell(namespace, initial, options)))
            .clone();
        Ok(cell)
    }

    /// Update the value of `namespace`, creating the cell if needed
    ///
    /// An existing cell keeps its original options; `options` only applies
    /// when this call creates the cell.
    pub fn set(&self, namespace: &str, value: T, options: StoreOptions) -> Result<()> {
        validate_namespace(namespace)?;

        match self.cells.entry(namespace.to_string()) {
            Entry::Occupied(entry) => {
                let cell = Arc::clone(entry.get());
                // Release the shard lock before subscribers run
                drop(entry);
                cell.update(value);
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(self.create_cell(namespace, value, options)));
            }
        }
        Ok(())
    }

    /// [`set`](Self::set) with persistence enabled for a newly created cell
    pub fn persist(&self, namespace: &str, value: T) -> Result<()> {
        self.set(namespace, value, StoreOptions::persistent())
    }

    /// Delete the persisted entry for `namespace`
    ///
    /// The in-memory cell, if any, keeps its value and subscribers. Storage
    /// failures are logged and otherwise ignored.
    pub fn clear_persisted(&self, namespace: &str) {
        let key = storage_key(namespace);
        match self.storage.remove(&key) {
            Ok(()) => debug!("Cleared persisted entry {}", key),
            Err(e) => warn!("Failed to clear persisted entry {}: {}", key, e),
        }
    }

    /// Bind a consumer to `namespace`
    ///
    /// `on_change` is subscribed until the returned [`Binding`] is dropped.
    pub fn bind<F>(
        &self,
        namespace: &str,
        initial: T,
        options: StoreOptions,
        on_change: F,
    ) -> Result<Binding<T>>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let cell = self.get_or_create(namespace, initial, options)?;
        let trigger: Subscriber<T> = Arc::new(on_change);
        Ok(Binding::attach(cell, trigger))
    }

    /// Current value of `namespace` without creating a cell
    ///
    /// Returns the live value when a cell exists, otherwise the decoded
    /// persisted entry. Nothing is written to storage; unreadable or
    /// undecodable entries read as `None`.
    pub fn peek(&self, namespace: &str) -> Option<T> {
        if let Some(cell) = self.get(namespace) {
            return Some(cell.value());
        }

        let key = storage_key(namespace);
        let text = match self.storage.get(&key) {
            Ok(text) => text?,
            Err(e) => {
                warn!("Failed to read {} from storage: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to decode stored value for {}: {}", key, e);
                None
            }
        }
    }

    /// Existing cell for `namespace`, without creating one
    pub fn get(&self, namespace: &str) -> Option<Arc<StateCell<T>>> {
        self.cells.get(namespace).map(|cell| Arc::clone(cell.value()))
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.cells.contains_key(namespace)
    }

    /// Number of namespaces with a cell
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Known namespaces, sorted
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cells.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    /// Storage backend shared by this registry's persistent cells
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn create_cell(&self, namespace: &str, initial: T, options: StoreOptions) -> StateCell<T> {
        StateCell::new(initial, namespace, options, Arc::clone(&self.storage))
    }
}

fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(StoreError::InvalidNamespace);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::subscriber;
    use crate::storage::MemoryStorage;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> StateRegistry<Value> {
        StateRegistry::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_get_or_create_returns_same_cell() {
        let registry = registry();

        let cell = registry
            .get_or_create("count", json!(0), StoreOptions::default())
            .unwrap();
        assert_eq!(cell.value(), json!(0));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let seen = seen.clone();
            subscriber(move |v: &Value| seen.lock().push(v.clone()))
        };
        cell.subscribe(&sub);
        cell.update(json!(5));
        assert_eq!(*seen.lock(), vec![json!(5)]);

        let again = registry
            .get_or_create("count", json!(999), StoreOptions::persistent())
            .unwrap();
        assert!(Arc::ptr_eq(&cell, &again));
        assert_eq!(again.value(), json!(5));
        assert!(!again.is_persistent());
        assert_eq!(again.subscriber_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_namespace_is_rejected() {
        let registry = registry();

        assert_eq!(
            registry
                .get_or_create("", json!(1), StoreOptions::default())
                .unwrap_err(),
            StoreError::InvalidNamespace
        );
        assert_eq!(
            registry.set("", json!(1), StoreOptions::default()),
            Err(StoreError::InvalidNamespace)
        );
        assert!(registry.bind("", json!(1), StoreOptions::default(), |_| {}).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_set_updates_existing_cell() {
        let registry = registry();
        let counter = Arc::new(AtomicUsize::new(0));

        let cell = registry
            .get_or_create("count", json!(0), StoreOptions::default())
            .unwrap();
        let sub = {
            let counter = counter.clone();
            subscriber(move |_: &Value| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        };
        cell.subscribe(&sub);

        registry.set("count", json!(10), StoreOptions::default()).unwrap();

        assert_eq!(cell.value(), json!(10));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_creates_missing_cell_without_notifying() {
        let registry = registry();
        registry
            .set("fresh", json!({"a": 1}), StoreOptions::default())
            .unwrap();

        let cell = registry.get("fresh").unwrap();
        assert_eq!(cell.value(), json!({"a": 1}));
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_set_does_not_upgrade_existing_cell_to_persistent() {
        let registry = registry();
        registry.set("count", json!(1), StoreOptions::default()).unwrap();

        registry.persist("count", json!(2)).unwrap();

        let cell = registry.get("count").unwrap();
        assert_eq!(cell.value(), json!(2));
        assert!(!cell.is_persistent());
        assert_eq!(registry.storage().get(&storage_key("count")).unwrap(), None);
    }

    #[test]
    fn test_persist_creates_persistent_cell() {
        let registry = registry();
        registry.persist("theme", json!("dark")).unwrap();

        let cell = registry.get("theme").unwrap();
        assert!(cell.is_persistent());
        assert_eq!(
            registry.storage().get(&storage_key("theme")).unwrap().as_deref(),
            Some("\"dark\"")
        );
    }

    #[test]
    fn test_set_on_new_persistent_namespace_prefers_stored_value() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.set(&storage_key("theme"), "\"light\"").unwrap();

        let registry: StateRegistry<Value> = StateRegistry::new(storage);
        registry.persist("theme", json!("dark")).unwrap();

        assert_eq!(registry.get("theme").unwrap().value(), json!("light"));
    }

    #[test]
    fn test_theme_survives_reload() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let first: StateRegistry<Value> = StateRegistry::new(storage.clone());
        let theme = first
            .get_or_create("theme", json!("dark"), StoreOptions::persistent())
            .unwrap();
        assert_eq!(theme.value(), json!("dark"));
        theme.update(json!("light"));

        let second: StateRegistry<Value> = StateRegistry::new(storage);
        let theme = second
            .get_or_create("theme", json!("dark"), StoreOptions::persistent())
            .unwrap();
        assert_eq!(theme.value(), json!("light"));
    }

    #[test]
    fn test_clear_persisted_leaves_cell_untouched() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let registry: StateRegistry<Value> = StateRegistry::new(storage.clone());

        let cell = registry
            .get_or_create("theme", json!("dark"), StoreOptions::persistent())
            .unwrap();
        cell.update(json!("light"));

        registry.clear_persisted("theme");
        // Clearing twice is fine
        registry.clear_persisted("theme");
        registry.clear_persisted("never-stored");

        assert_eq!(cell.value(), json!("light"));
        assert_eq!(storage.get(&storage_key("theme")).unwrap(), None);

        let reloaded: StateRegistry<Value> = StateRegistry::new(storage);
        let cell = reloaded
            .get_or_create("theme", json!("dark"), StoreOptions::persistent())
            .unwrap();
        assert_eq!(cell.value(), json!("dark"));
    }

    #[test]
    fn test_peek_does_not_create_or_write() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let registry: StateRegistry<Value> = StateRegistry::new(storage.clone());

        assert_eq!(registry.peek("theme"), None);
        assert!(registry.is_empty());
        assert_eq!(storage.get(&storage_key("theme")).unwrap(), None);

        storage.set(&storage_key("theme"), "\"light\"").unwrap();
        assert_eq!(registry.peek("theme"), Some(json!("light")));
        assert!(!registry.contains("theme"));

        storage.set(&storage_key("broken"), "{not json").unwrap();
        assert_eq!(registry.peek("broken"), None);
    }

    #[test]
    fn test_peek_prefers_live_value() {
        let registry = registry();
        let cell = registry
            .get_or_create("count", json!(1), StoreOptions::default())
            .unwrap();
        cell.update(json!(7));

        assert_eq!(registry.peek("count"), Some(json!(7)));
    }

    #[test]
    fn test_namespaces_listing() {
        let registry = registry();
        registry.set("b", json!(1), StoreOptions::default()).unwrap();
        registry.set("a", json!(2), StoreOptions::default()).unwrap();

        assert_eq!(registry.namespaces(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.contains("a"));
        assert!(!registry.contains("c"));
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_typed_registry() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Prefs {
            volume: u8,
            muted: bool,
        }

        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let registry: StateRegistry<Prefs> = StateRegistry::new(storage.clone());
        let cell = registry
            .get_or_create(
                "prefs",
                Prefs { volume: 5, muted: false },
                StoreOptions::persistent(),
            )
            .unwrap();
        cell.update(Prefs { volume: 9, muted: true });

        let reloaded: StateRegistry<Prefs> = StateRegistry::new(storage);
        let cell = reloaded
            .get_or_create(
                "prefs",
                Prefs { volume: 0, muted: false },
                StoreOptions::persistent(),
            )
            .unwrap();
        assert_eq!(cell.with_value(|p| p.volume), 9);
        assert!(cell.value().muted);
    }

    #[test]
    fn test_concurrent_get_or_create_yields_one_cell() {
        let registry = Arc::new(registry());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .get_or_create("shared", json!(i), StoreOptions::default())
                        .unwrap()
                })
            })
            .collect();

        let cells: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(cells.iter().all(|c| Arc::ptr_eq(c, &cells[0])));
        assert_eq!(registry.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_last_update_wins_and_is_broadcast(values in prop::collection::vec(any::<i64>(), 1..20)) {
            let registry: StateRegistry<i64> = StateRegistry::new(Arc::new(MemoryStorage::new()));
            let cell = registry.get_or_create("n", 0, StoreOptions::persistent()).unwrap();

            let seen = Arc::new(Mutex::new(Vec::new()));
            let sub = {
                let seen = seen.clone();
                subscriber(move |v: &i64| seen.lock().push(*v))
            };
            cell.subscribe(&sub);
            cell.subscribe(&sub);

            for v in &values {
                registry.set("n", *v, StoreOptions::default()).unwrap();
            }

            let last = *values.last().unwrap();
            prop_assert_eq!(cell.value(), last);
            prop_assert_eq!(&*seen.lock(), &values);
            prop_assert_eq!(
                registry.storage().get(&storage_key("n")).unwrap(),
                Some(last.to_string())
            );
        }
    }
}
