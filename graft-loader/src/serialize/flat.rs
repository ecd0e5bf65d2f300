//! Flat `{data, included, meta}` rendering.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::HashSet;
use std::sync::Arc;

use super::{Serializer, stub};
use crate::error::{LoadError, LoadResult};
use crate::model::{self, Entity, ID_FIELD, Reference, TYPE_FIELD, Value};
use crate::relations::Relations;

/// One entity in the `included` section.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludedEntry {
    /// Dedup key: base64 of `{"id", "type", "relations"}` for the relation
    /// scope the entity was first reached with.
    pub key: String,
    /// The entity's identity.
    pub reference: Reference,
    /// The rendered entity, nested entities replaced by stubs.
    pub body: serde_json::Value,
}

/// A graph in flat form.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatDocument {
    /// Primary entities, or the rendered root when it holds none.
    pub data: serde_json::Value,
    /// Every other resolved entity, once.
    pub included: Vec<IncludedEntry>,
    /// Document meta.
    pub meta: serde_json::Map<String, serde_json::Value>,
}

/// How much of a [`FlatDocument`] [`FlatDocument::to_json_as`] emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Envelope {
    /// `data`, `included` and `meta`, always all three.
    #[default]
    Full,
    /// `data`, plus `included` and `meta` when they are non-empty.
    Compact,
    /// The primary data alone, without an envelope.
    Bare,
}

impl FlatDocument {
    /// The wire shape `{"data": .., "included": [..], "meta": {..}}`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_as(Envelope::Full)
    }

    /// Render with the chosen envelope.
    pub fn to_json_as(&self, envelope: Envelope) -> serde_json::Value {
        if envelope == Envelope::Bare {
            return self.data.clone();
        }

        let mut document = serde_json::Map::with_capacity(3);
        document.insert("data".to_string(), self.data.clone());
        if envelope == Envelope::Full || !self.included.is_empty() {
            document.insert(
                "included".to_string(),
                self.included.iter().map(|entry| entry.body.clone()).collect(),
            );
        }
        if envelope == Envelope::Full || !self.meta.is_empty() {
            document.insert("meta".to_string(), serde_json::Value::Object(self.meta.clone()));
        }
        serde_json::Value::Object(document)
    }

    /// Parse the wire shape.
    ///
    /// Dedup keys are not part of the wire shape; parsed entries are keyed
    /// with an empty relation scope.
    pub fn from_json(json: &serde_json::Value) -> LoadResult<Self> {
        let document = json
            .as_object()
            .ok_or_else(|| LoadError::deserialization("document must be an object"))?;

        let data = document.get("data").cloned().unwrap_or(serde_json::Value::Null);
        let meta = match document.get("meta") {
            Some(serde_json::Value::Object(meta)) => meta.clone(),
            Some(serde_json::Value::Null) | None => serde_json::Map::new(),
            Some(_) => return Err(LoadError::deserialization("`meta` must be an object")),
        };

        let mut included = Vec::new();
        if let Some(bodies) = document.get("included") {
            let bodies = bodies
                .as_array()
                .ok_or_else(|| LoadError::deserialization("`included` must be an array"))?;
            for body in bodies {
                let reference = body
                    .as_object()
                    .map(model::identity)
                    .transpose()?
                    .flatten()
                    .ok_or_else(|| {
                        LoadError::deserialization("included entries need an `id` and a `type`")
                    })?;
                included.push(IncludedEntry {
                    key: dedup_key(&reference, &Relations::none()),
                    reference,
                    body: body.clone(),
                });
            }
        }

        Ok(Self { data, included, meta })
    }

    /// Rebuild a graph, sharing one entity instance per `(type, id)`.
    ///
    /// Stubs with a body in `included` or `data` become entities; the rest
    /// stay references.
    pub fn reassemble(&self) -> LoadResult<Value> {
        let bodies = self.included.iter().filter_map(|entry| {
            entry
                .body
                .as_object()
                .map(|body| (entry.reference.clone(), body))
        });
        model::reassemble(&self.data, bodies)
    }

    /// Look up an included entity by identity.
    pub fn find_included(&self, reference: &Reference) -> Option<&IncludedEntry> {
        self.included.iter().find(|entry| &entry.reference == reference)
    }
}

/// Dedup key for an entity reached with a relation scope.
pub(crate) fn dedup_key(reference: &Reference, relations: &Relations) -> String {
    let key = serde_json::json!({
        "id": reference.id().to_json(),
        "type": reference.type_name(),
        "relations": relations.to_json(),
    });
    BASE64.encode(key.to_string())
}

struct FlatState {
    seen: HashSet<Reference>,
    entries: Vec<IncludedEntry>,
}

impl Serializer<'_> {
    /// Render `root` in flat form.
    ///
    /// The root entity (or each entity of a root list) is rendered in full
    /// in `data`. Every other resolved entity is replaced by a stub and
    /// rendered once in `included`, keyed by the relation scope of its
    /// first encounter. Included entries follow the store's inclusion order
    /// where known, then encounter order.
    pub fn to_flat(&self, root: &Value) -> FlatDocument {
        let mut state = FlatState {
            seen: HashSet::new(),
            entries: Vec::new(),
        };

        let primary: Vec<&Value> = match root {
            Value::EntityList(list) => list.items().iter().collect(),
            Value::List(items) => items.iter().collect(),
            other => vec![other],
        };
        let resolved: Vec<Option<Arc<Entity>>> = primary.iter().map(|v| self.resolve(v)).collect();
        for entity in resolved.iter().flatten() {
            state.seen.insert(entity.reference().clone());
        }

        let data = match root {
            Value::EntityList(_) | Value::List(_) => serde_json::Value::Array(
                primary
                    .iter()
                    .zip(&resolved)
                    .map(|(value, entity)| match entity {
                        Some(entity) => self.flat_body(entity, &self.relations, &mut state),
                        None => self.flat_value(value, &self.relations, &mut state),
                    })
                    .collect(),
            ),
            other => match resolved.first().and_then(Option::as_ref) {
                Some(entity) => self.flat_body(entity, &self.relations, &mut state),
                None => self.flat_value(other, &self.relations, &mut state),
            },
        };

        let mut meta = self.meta.clone();
        if let Value::EntityList(list) = root {
            for (key, value) in list.meta() {
                meta.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let mut included: Vec<(usize, IncludedEntry)> = state.entries.into_iter().enumerate().collect();
        if let Some(store) = self.store {
            included.sort_by_key(|(encounter, entry)| {
                (store.include_rank(&entry.reference).unwrap_or(usize::MAX), *encounter)
            });
        }

        FlatDocument {
            data,
            included: included.into_iter().map(|(_, entry)| entry).collect(),
            meta,
        }
    }

    fn flat_value(&self, value: &Value, scope: &Relations, state: &mut FlatState) -> serde_json::Value {
        match value {
            Value::Scalar(scalar) => scalar.to_json(),
            Value::Reference(reference) => match self.resolve(value) {
                Some(entity) => self.flat_include(&entity, scope, state),
                None => reference.to_json(),
            },
            Value::Entity(entity) => self.flat_include(entity, scope, state),
            Value::EntityList(list) => serde_json::Value::Array(
                list.items()
                    .iter()
                    .map(|item| self.flat_value(item, scope, state))
                    .collect(),
            ),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| self.flat_value(item, scope, state))
                    .collect(),
            ),
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(name, item)| {
                        let nested = scope.nested(name).unwrap_or_default();
                        (name.to_string(), self.flat_value(item, &nested, state))
                    })
                    .collect(),
            ),
        }
    }

    fn flat_include(&self, entity: &Arc<Entity>, scope: &Relations, state: &mut FlatState) -> serde_json::Value {
        let reference = entity.reference();
        if state.seen.insert(reference.clone()) {
            let slot = state.entries.len();
            state.entries.push(IncludedEntry {
                key: dedup_key(reference, scope),
                reference: reference.clone(),
                body: serde_json::Value::Null,
            });
            let body = self.flat_body(entity, scope, state);
            state.entries[slot].body = body;
        }
        stub(entity)
    }

    fn flat_body(&self, entity: &Arc<Entity>, scope: &Relations, state: &mut FlatState) -> serde_json::Value {
        let fields = entity.fields();
        let mut map = serde_json::Map::with_capacity(fields.len() + 2);
        map.insert(ID_FIELD.to_string(), entity.id().to_json());
        map.insert(TYPE_FIELD.to_string(), entity.type_name().into());
        for (name, value) in fields.iter() {
            let nested = scope.nested(name).unwrap_or_default();
            map.insert(name.to_string(), self.flat_value(value, &nested, state));
        }
        drop(fields);
        self.finish(entity, map)
    }
}
