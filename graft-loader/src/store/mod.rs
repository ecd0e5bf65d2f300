//! Request-scoped object cache.
//!
//! The [`Store`] holds every entity seen during a request keyed by
//! `(type, id)`, plus query collections keyed by `(type, QueryKey)`. It also
//! records which entities are *included* (reached through a requested
//! relation) and which ids a fetcher failed to return.
//!
//! A store lives for one request and is then dropped. There is no eviction
//! besides the explicit `clear*` operations.
//!
//! ```rust
//! use graft_loader::{Entity, Store, Value};
//!
//! let mut store = Store::new();
//! let user = Entity::new(1, "user").unwrap().into_shared();
//! store.put(&Value::Entity(user), true).unwrap();
//!
//! assert!(store.has(1, "user"));
//! assert!(!store.has("1", "user"));
//! ```

mod key;
mod stats;

pub use key::{QueryKey, StoreKey};
pub use stats::{StoreMetrics, StoreStats};

pub(crate) use key::canonical_json;

use indexmap::IndexSet;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{LoadError, LoadResult};
use crate::model::{Entity, EntityList, Identifier, Reference, Value};

/// Request-scoped cache of entities and collections.
#[derive(Debug, Default)]
pub struct Store {
    items: HashMap<SmolStr, HashMap<Identifier, Arc<Entity>>>,
    collections: HashMap<SmolStr, HashMap<QueryKey, EntityList>>,
    included: IndexSet<Reference>,
    missing: HashSet<Reference>,
    metrics: StoreMetrics,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check for an entry without touching the metrics.
    pub fn has(&self, key: impl Into<StoreKey>, type_name: &str) -> bool {
        match key.into() {
            StoreKey::Id(id) => self
                .items
                .get(type_name)
                .is_some_and(|items| items.contains_key(&id)),
            StoreKey::Query(query) => self
                .collections
                .get(type_name)
                .is_some_and(|lists| lists.contains_key(&query)),
        }
    }

    /// Look up an entity or collection.
    pub fn get(&self, key: impl Into<StoreKey>, type_name: &str) -> Option<Value> {
        let found = match key.into() {
            StoreKey::Id(id) => self
                .items
                .get(type_name)
                .and_then(|items| items.get(&id))
                .map(|entity| Value::Entity(entity.clone())),
            StoreKey::Query(query) => self
                .collections
                .get(type_name)
                .and_then(|lists| lists.get(&query))
                .map(|list| Value::EntityList(list.clone())),
        };
        self.record_lookup(found.is_some());
        found
    }

    /// Look up the shared instance for a reference.
    pub fn get_entity(&self, reference: &Reference) -> Option<Arc<Entity>> {
        let found = self.peek(reference).cloned();
        self.record_lookup(found.is_some());
        found
    }

    /// Look up a collection by its query parameters.
    pub fn get_collection(
        &self,
        type_name: &str,
        params: &serde_json::Value,
    ) -> LoadResult<Option<EntityList>> {
        let key = QueryKey::from_params(params)?;
        Ok(self
            .get(key, type_name)
            .and_then(|value| match value {
                Value::EntityList(list) => Some(list),
                _ => None,
            }))
    }

    pub(crate) fn peek(&self, reference: &Reference) -> Option<&Arc<Entity>> {
        self.items
            .get(reference.type_name())
            .and_then(|items| items.get(reference.id()))
    }

    /// Store an entity or an entity list.
    ///
    /// With `include` set, stored entities are also marked as included.
    /// References and plain values cannot be stored.
    pub fn put(&mut self, value: &Value, include: bool) -> LoadResult<()> {
        match value {
            Value::Entity(entity) => {
                self.put_entity(entity.clone(), include);
                Ok(())
            }
            Value::EntityList(list) => self.put_list(list, include),
            Value::Reference(reference) => Err(LoadError::invalid_entity(format!(
                "cannot store unresolved reference {}",
                reference
            ))
            .with_type(reference.type_name())
            .with_context("storing a value")),
            other => Err(LoadError::invalid_entity(format!(
                "cannot store a {} without identity",
                other.kind()
            ))
            .with_context("storing a value")),
        }
    }

    /// Store a single entity, replacing any earlier instance.
    pub fn put_entity(&mut self, entity: Arc<Entity>, include: bool) {
        let reference = entity.reference().clone();
        self.missing.remove(&reference);
        self.items
            .entry(reference.type_key().clone())
            .or_default()
            .insert(reference.id().clone(), entity);
        self.metrics.record_write();

        if include {
            self.mark_included(reference);
        }
    }

    /// Store every entity of a list, and the list itself when it has both
    /// an element type and query parameters.
    pub fn put_list(&mut self, list: &EntityList, include: bool) -> LoadResult<()> {
        for entity in list.entities() {
            self.put_entity(entity.clone(), include);
        }

        if let (Some(type_name), Some(params)) = (list.element_type(), list.params()) {
            let key = QueryKey::from_params(params)?;
            self.collections
                .entry(SmolStr::new(type_name))
                .or_default()
                .insert(key, list.clone());
            self.metrics.record_write();
        }
        Ok(())
    }

    /// Remove one entry.
    ///
    /// Clearing an entity also drops every cached collection of its type,
    /// since those may contain it, along with its inclusion and missing
    /// marks.
    pub fn clear(&mut self, key: impl Into<StoreKey>, type_name: &str) {
        match key.into() {
            StoreKey::Id(id) => {
                if let Some(items) = self.items.get_mut(type_name) {
                    items.remove(&id);
                }
                self.collections.remove(type_name);
                if let Ok(reference) = Reference::new(id, type_name) {
                    self.included.shift_remove(&reference);
                    self.missing.remove(&reference);
                }
            }
            StoreKey::Query(query) => {
                if let Some(lists) = self.collections.get_mut(type_name) {
                    lists.remove(&query);
                }
            }
        }
        self.metrics.record_clear();
    }

    /// Remove every entry of one type.
    pub fn clear_type(&mut self, type_name: &str) {
        self.items.remove(type_name);
        self.collections.remove(type_name);
        self.included.retain(|r| r.type_name() != type_name);
        self.missing.retain(|r| r.type_name() != type_name);
        self.metrics.record_clear();
    }

    /// Remove everything.
    pub fn clear_all(&mut self) {
        self.items.clear();
        self.collections.clear();
        self.included.clear();
        self.missing.clear();
        self.metrics.record_clear();
    }

    /// Whether an entity is marked as included.
    pub fn includes(&self, reference: &Reference) -> bool {
        self.included.contains(reference)
    }

    /// Mark an entity as included. Returns `false` if it already was.
    pub fn mark_included(&mut self, reference: Reference) -> bool {
        self.included.insert(reference)
    }

    /// Included entities in marking order.
    pub fn included(&self) -> impl Iterator<Item = &Reference> {
        self.included.iter()
    }

    /// Position of an entity in the inclusion order.
    pub fn include_rank(&self, reference: &Reference) -> Option<usize> {
        self.included.get_index_of(reference)
    }

    /// Drop all inclusion marks.
    pub fn clear_included(&mut self) {
        self.included.clear();
    }

    /// Record that a fetcher did not return an entity.
    pub fn mark_missing(&mut self, reference: Reference) {
        if self.missing.insert(reference) {
            self.metrics.record_missing();
        }
    }

    /// Whether a fetcher already failed to return an entity.
    pub fn is_missing(&self, reference: &Reference) -> bool {
        self.missing.contains(reference)
    }

    /// Number of cached entities across all types.
    pub fn len(&self) -> usize {
        self.items.values().map(HashMap::len).sum()
    }

    /// Whether no entity is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metrics snapshot including entry counts.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.metrics.snapshot();
        stats.entities = self.len();
        stats.collections = self.collections.values().map(HashMap::len).sum();
        stats.included = self.included.len();
        stats
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: i64) -> Arc<Entity> {
        Entity::new(id, "user")
            .unwrap()
            .with_field("name", format!("user {}", id))
            .unwrap()
            .into_shared()
    }

    #[test]
    fn test_put_and_get() {
        let mut store = Store::new();
        let entity = user(1);
        store.put(&Value::Entity(entity.clone()), false).unwrap();

        assert!(store.has(1, "user"));
        assert!(!store.has(2, "user"));
        assert!(!store.has(1, "article"));

        let found = store.get(1, "user").unwrap();
        assert!(Arc::ptr_eq(found.as_entity().unwrap(), &entity));
        assert!(!store.includes(entity.reference()));
    }

    #[test]
    fn test_later_put_overwrites() {
        let mut store = Store::new();
        store.put_entity(user(1), false);
        let replacement = user(1);
        store.put_entity(replacement.clone(), false);

        let found = store.get_entity(replacement.reference()).unwrap();
        assert!(Arc::ptr_eq(&found, &replacement));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_rejects_reference_and_scalar() {
        let mut store = Store::new();
        let reference = Value::from(Reference::new(1, "user").unwrap());
        assert!(store.put(&reference, false).is_err());
        assert!(store.put(&Value::from(3), false).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_list_with_params_caches_collection() {
        let mut store = Store::new();
        let params = json!({"status": "active", "limit": 2});
        let list = EntityList::from_entities("user", vec![user(1), user(2)])
            .unwrap()
            .with_params(params.clone());

        store.put(&Value::EntityList(list), true).unwrap();

        assert!(store.has(1, "user"));
        assert!(store.has(2, "user"));
        assert!(store.has(StoreKey::query(&params).unwrap(), "user"));

        let reordered = json!({"limit": 2, "status": "active"});
        let cached = store.get_collection("user", &reordered).unwrap().unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(store.included().count(), 2);
    }

    #[test]
    fn test_clear_drops_collections_and_marks() {
        let mut store = Store::new();
        let params = json!({"status": "active"});
        let list = EntityList::from_entities("user", vec![user(1), user(2)])
            .unwrap()
            .with_params(params.clone());
        store.put_list(&list, true).unwrap();

        store.clear(1, "user");

        assert!(!store.has(1, "user"));
        assert!(store.has(2, "user"));
        assert!(!store.has(StoreKey::query(&params).unwrap(), "user"));
        assert!(!store.includes(&Reference::new(1, "user").unwrap()));
        assert!(store.includes(&Reference::new(2, "user").unwrap()));
    }

    #[test]
    fn test_clear_type_and_all() {
        let mut store = Store::new();
        store.put_entity(user(1), true);
        store.put_entity(Entity::new(10, "article").unwrap().into_shared(), true);

        store.clear_type("user");
        assert!(!store.has(1, "user"));
        assert!(store.has(10, "article"));
        assert_eq!(store.included().count(), 1);

        store.clear_all();
        assert!(store.is_empty());
        assert_eq!(store.included().count(), 0);
    }

    #[test]
    fn test_inclusion_order() {
        let mut store = Store::new();
        let b = Reference::new(2, "user").unwrap();
        let a = Reference::new(1, "user").unwrap();

        assert!(store.mark_included(b.clone()));
        assert!(store.mark_included(a.clone()));
        assert!(!store.mark_included(b.clone()));

        assert_eq!(store.include_rank(&b), Some(0));
        assert_eq!(store.include_rank(&a), Some(1));

        store.clear_included();
        assert!(!store.includes(&a));
    }

    #[test]
    fn test_missing_marks() {
        let mut store = Store::new();
        let reference = Reference::new(15, "user").unwrap();
        store.mark_missing(reference.clone());
        store.mark_missing(reference.clone());
        assert!(store.is_missing(&reference));
        assert_eq!(store.stats().missing_marks, 1);

        store.put_entity(user(15), false);
        assert!(!store.is_missing(&reference));
    }

    #[test]
    fn test_stats() {
        let mut store = Store::new();
        store.put_entity(user(1), true);
        store.get(1, "user");
        store.get(2, "user");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entities, 1);
        assert_eq!(stats.included, 1);
    }
}
