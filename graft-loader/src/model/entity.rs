//! Identity-carrying graph nodes.

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;

use super::value::Value;
use crate::error::{LoadError, LoadResult};

/// Field name carrying an entity's id.
pub const ID_FIELD: &str = "id";
/// Field name carrying an entity's type.
pub const TYPE_FIELD: &str = "type";

/// An entity id.
///
/// Integer and string ids are distinct: `1` and `"1"` never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    /// Integer id.
    Int(i64),
    /// String id.
    Str(SmolStr),
}

impl Identifier {
    /// Read an id from JSON. Accepts integers and non-empty strings.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Identifier::Int),
            serde_json::Value::String(s) if !s.is_empty() => Some(Identifier::Str(s.into())),
            _ => None,
        }
    }

    /// Render the id as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Identifier::Int(i) => serde_json::Value::from(*i),
            Identifier::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Identifier::Str(s) if s.is_empty())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(i) => write!(f, "{}", i),
            Identifier::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Int(id)
    }
}

impl From<i32> for Identifier {
    fn from(id: i32) -> Self {
        Identifier::Int(id.into())
    }
}

impl From<u32> for Identifier {
    fn from(id: u32) -> Self {
        Identifier::Int(id.into())
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Identifier::Str(id.into())
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Identifier::Str(id.into())
    }
}

impl From<SmolStr> for Identifier {
    fn from(id: SmolStr) -> Self {
        Identifier::Str(id)
    }
}

/// An unresolved pointer to an entity: just its `(type, id)`.
///
/// Ordered by type first, then id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    type_name: SmolStr,
    id: Identifier,
}

impl Reference {
    /// Create a reference. Fails when the id or the type is empty.
    pub fn new(id: impl Into<Identifier>, type_name: impl Into<SmolStr>) -> LoadResult<Self> {
        let id = id.into();
        let type_name = type_name.into();

        if type_name.is_empty() {
            return Err(LoadError::invalid_entity(format!(
                "reference with id {} has an empty type",
                id
            ))
            .with_field(TYPE_FIELD));
        }
        if id.is_empty() {
            return Err(LoadError::invalid_entity(format!(
                "reference of type '{}' has an empty id",
                type_name
            ))
            .with_type(type_name.as_str())
            .with_field(ID_FIELD));
        }

        Ok(Self { type_name, id })
    }

    /// The id.
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// The type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn type_key(&self) -> &SmolStr {
        &self.type_name
    }

    /// Render as an `{"id", "type"}` stub.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(2);
        map.insert(ID_FIELD.to_string(), self.id.to_json());
        map.insert(TYPE_FIELD.to_string(), self.type_name.as_str().into());
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.id)
    }
}

/// A resolved node: identity plus an ordered set of fields.
///
/// Identity is fixed at construction. Fields sit behind a lock so a single
/// shared `Arc<Entity>` can be spliced into many places of a graph.
pub struct Entity {
    reference: Reference,
    fields: RwLock<IndexMap<SmolStr, Value>>,
}

impl Entity {
    /// Create an entity without fields.
    pub fn new(id: impl Into<Identifier>, type_name: impl Into<SmolStr>) -> LoadResult<Self> {
        Ok(Self::from_reference(Reference::new(id, type_name)?))
    }

    /// Create an entity for an existing reference.
    pub fn from_reference(reference: Reference) -> Self {
        Self {
            reference,
            fields: RwLock::new(IndexMap::new()),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(self, name: impl Into<SmolStr>, value: impl Into<Value>) -> LoadResult<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Wrap in an `Arc` for sharing across a graph.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The id.
    pub fn id(&self) -> &Identifier {
        self.reference.id()
    }

    /// The type name.
    pub fn type_name(&self) -> &str {
        self.reference.type_name()
    }

    /// The identity of this entity.
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Get a copy of a field value.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.read_recursive().get(name).cloned()
    }

    /// Set a field, returning the previous value.
    ///
    /// The identity fields `id` and `type` cannot be set.
    pub fn set(&self, name: impl Into<SmolStr>, value: impl Into<Value>) -> LoadResult<Option<Value>> {
        let name = name.into();
        if name == ID_FIELD || name == TYPE_FIELD {
            return Err(LoadError::invalid_entity(format!(
                "field '{}' of {} is part of its identity and cannot be set",
                name, self.reference
            ))
            .with_type(self.type_name())
            .with_field(name.as_str()));
        }
        Ok(self.fields.write().insert(name, value.into()))
    }

    /// Remove a field.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.fields.write().shift_remove(name)
    }

    /// Check whether a field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.read_recursive().contains_key(name)
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> Vec<SmolStr> {
        self.fields.read_recursive().keys().cloned().collect()
    }

    /// Number of fields, identity excluded.
    pub fn len(&self) -> usize {
        self.fields.read_recursive().len()
    }

    /// Whether the entity has no fields besides its identity.
    pub fn is_empty(&self) -> bool {
        self.fields.read_recursive().is_empty()
    }

    /// Read access to all fields.
    ///
    /// Reads are recursive so a graph containing cycles can be walked
    /// while an ancestor's guard is still alive.
    pub fn fields(&self) -> RwLockReadGuard<'_, IndexMap<SmolStr, Value>> {
        self.fields.read_recursive()
    }

    pub(crate) fn fields_mut(&self) -> RwLockWriteGuard<'_, IndexMap<SmolStr, Value>> {
        self.fields.write()
    }
}

impl fmt::Debug for Entity {
    // Field values are left out: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.reference.type_name)
            .field("id", &self.reference.id)
            .field("fields", &self.field_names())
            .finish()
    }
}

/// A sequence of entities and references, optionally of a single type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityList {
    element_type: Option<SmolStr>,
    items: Vec<Value>,
    params: Option<serde_json::Value>,
    meta: serde_json::Map<String, serde_json::Value>,
}

impl EntityList {
    /// Create an empty list. `None` allows items of any type.
    pub fn new(element_type: Option<SmolStr>) -> Self {
        Self {
            element_type,
            ..Self::default()
        }
    }

    /// Create an empty list restricted to one type.
    pub fn typed(element_type: impl Into<SmolStr>) -> Self {
        Self::new(Some(element_type.into()))
    }

    /// Create an empty list accepting any type.
    pub fn heterogeneous() -> Self {
        Self::new(None)
    }

    /// Build a typed list from shared entities.
    pub fn from_entities(
        element_type: impl Into<SmolStr>,
        entities: impl IntoIterator<Item = Arc<Entity>>,
    ) -> LoadResult<Self> {
        let mut list = Self::typed(element_type);
        for entity in entities {
            list.push(Value::Entity(entity))?;
        }
        Ok(list)
    }

    /// Attach the query parameters that produced this list.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Attach a meta entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Append an entity or reference.
    pub fn push(&mut self, item: impl Into<Value>) -> LoadResult<()> {
        let item = item.into();
        let reference = match &item {
            Value::Entity(entity) => entity.reference().clone(),
            Value::Reference(reference) => reference.clone(),
            other => {
                return Err(LoadError::invalid_entity(format!(
                    "entity lists hold entities and references, got {}",
                    other.kind()
                )));
            }
        };

        if let Some(ref expected) = self.element_type {
            if reference.type_name() != expected.as_str() {
                return Err(LoadError::invalid_entity(format!(
                    "{} does not belong in a list of '{}'",
                    reference, expected
                ))
                .with_type(expected.as_str()));
            }
        }

        self.items.push(item);
        Ok(())
    }

    /// The declared element type, if any.
    pub fn element_type(&self) -> Option<&str> {
        self.element_type.as_deref()
    }

    /// The query parameters that produced this list.
    pub fn params(&self) -> Option<&serde_json::Value> {
        self.params.as_ref()
    }

    /// List meta.
    pub fn meta(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.meta
    }

    /// All items.
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Value] {
        &mut self.items
    }

    /// Consume the list, returning its items.
    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    /// Resolved items.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.items.iter().filter_map(Value::as_entity)
    }

    /// Identity of every item, resolved or not.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.items.iter().filter_map(Value::identity)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
