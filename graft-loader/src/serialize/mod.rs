//! Rendering graphs as JSON.
//!
//! Two shapes are supported:
//!
//! - **nested**: every resolved entity inlined where it occurs,
//! - **flat**: primary entities in `data`, every other resolved entity
//!   exactly once in `included`, with `{"id", "type"}` stubs pointing at it.
//!
//! A reference is rendered as resolved when the store holds its entity and
//! has it marked as included. Without a store only entities already present
//! in the graph are resolved.
//!
//! A transform set with [`Serializer::with_transform`] sees every rendered
//! entity body, in both shapes, and may rewrite it:
//!
//! ```rust
//! use graft_loader::{Entity, Serializer, Value};
//!
//! let user = Entity::new(1, "user").unwrap().with_field("password", "hunter2").unwrap();
//! let serializer = Serializer::detached().with_transform(|_, mut body| {
//!     body.remove("password");
//!     body
//! });
//! assert_eq!(
//!     serializer.to_nested(&Value::entity(user)),
//!     serde_json::json!({"id": 1, "type": "user"})
//! );
//! ```

mod flat;
mod nested;

pub use flat::{Envelope, FlatDocument, IncludedEntry};

use std::fmt;
use std::sync::Arc;

use crate::model::{Entity, Value};
use crate::relations::Relations;
use crate::store::Store;

/// A rendered entity body.
pub type Body = serde_json::Map<String, serde_json::Value>;

/// Callback rewriting each rendered entity body.
pub type TransformFn = dyn Fn(&Entity, Body) -> Body + Send + Sync;

/// Renders graphs as nested or flat JSON.
#[derive(Clone)]
pub struct Serializer<'s> {
    store: Option<&'s Store>,
    relations: Relations,
    meta: serde_json::Map<String, serde_json::Value>,
    transform: Option<Arc<TransformFn>>,
}

impl<'s> Serializer<'s> {
    /// Serializer consulting `store` for included entities.
    pub fn new(store: &'s Store) -> Self {
        Self {
            store: Some(store),
            relations: Relations::none(),
            meta: serde_json::Map::new(),
            transform: None,
        }
    }

    /// Serializer working from the graph alone.
    pub fn detached() -> Self {
        Self {
            store: None,
            relations: Relations::none(),
            meta: serde_json::Map::new(),
            transform: None,
        }
    }

    /// Relation scope of the root, used to derive dedup keys.
    pub fn with_relations(mut self, relations: Relations) -> Self {
        self.relations = relations;
        self
    }

    /// Add a top-level meta entry to flat documents.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Rewrite every entity body after its fields are rendered.
    ///
    /// The body passed in already holds `id`, `type` and the rendered
    /// fields, with nested entities inlined (nested shape) or stubbed (flat
    /// shape). Stubs themselves are not transformed.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Entity, Body) -> Body + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// The root relation scope.
    pub fn relations(&self) -> &Relations {
        &self.relations
    }

    /// Apply the transform, if any, to a rendered body.
    fn finish(&self, entity: &Entity, body: Body) -> serde_json::Value {
        let body = match &self.transform {
            Some(transform) => transform(entity, body),
            None => body,
        };
        serde_json::Value::Object(body)
    }

    /// The entity a value renders as, if it renders resolved.
    fn resolve(&self, value: &Value) -> Option<Arc<Entity>> {
        match value {
            Value::Entity(entity) => Some(entity.clone()),
            Value::Reference(reference) => self
                .store
                .filter(|store| store.includes(reference))
                .and_then(|store| store.peek(reference).cloned()),
            _ => None,
        }
    }
}

impl fmt::Debug for Serializer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("detached", &self.store.is_none())
            .field("relations", &self.relations)
            .field("meta", &self.meta)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

fn stub(entity: &Entity) -> serde_json::Value {
    entity.reference().to_json()
}
