//! The tagged value that makes up a graph.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::sync::Arc;

use super::entity::{Entity, EntityList, Reference};

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    String(String),
    /// Point in time, serialized as UTC ISO-8601.
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    /// Render as JSON. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(i) => serde_json::Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Scalar::String(s) => serde_json::Value::String(s.clone()),
            Scalar::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
        }
    }
}

/// Any node of a graph.
#[derive(Debug, Clone)]
pub enum Value {
    /// A leaf.
    Scalar(Scalar),
    /// An unresolved entity.
    Reference(Reference),
    /// A resolved entity, possibly shared with other parts of the graph.
    Entity(Arc<Entity>),
    /// A list of entities and references.
    EntityList(EntityList),
    /// A plain list.
    List(Vec<Value>),
    /// A keyed group without identity.
    Object(IndexMap<SmolStr, Value>),
}

impl Value {
    /// The null value.
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    /// Wrap an entity.
    pub fn entity(entity: Entity) -> Self {
        Value::Entity(Arc::new(entity))
    }

    /// False only for an unresolved reference.
    pub fn resolved(&self) -> bool {
        !matches!(self, Value::Reference(_))
    }

    /// Whether this is an unresolved reference.
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    /// Whether this is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    /// The identity of a reference or entity.
    pub fn identity(&self) -> Option<&Reference> {
        match self {
            Value::Reference(reference) => Some(reference),
            Value::Entity(entity) => Some(entity.reference()),
            _ => None,
        }
    }

    /// The entity, if resolved.
    pub fn as_entity(&self) -> Option<&Arc<Entity>> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// The reference, if unresolved.
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// The entity list.
    pub fn as_entity_list(&self) -> Option<&EntityList> {
        match self {
            Value::EntityList(list) => Some(list),
            _ => None,
        }
    }

    /// The plain list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The keyed group.
    pub fn as_object(&self) -> Option<&IndexMap<SmolStr, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// The scalar.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// The string content of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The integer content of an integer scalar.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// A short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Reference(_) => "reference",
            Value::Entity(_) => "entity",
            Value::EntityList(_) => "entity list",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }
}

/// Entities compare by identity; everything else structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a.reference() == b.reference(),
            (Value::EntityList(a), Value::EntityList(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Int(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Scalar(Scalar::Int(i.into()))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Scalar(Scalar::Float(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::String(s))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Scalar(Scalar::Timestamp(t))
    }
}

impl From<Reference> for Value {
    fn from(reference: Reference) -> Self {
        Value::Reference(reference)
    }
}

impl From<Arc<Entity>> for Value {
    fn from(entity: Arc<Entity>) -> Self {
        Value::Entity(entity)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Value::entity(entity)
    }
}

impl From<EntityList> for Value {
    fn from(list: EntityList) -> Self {
        Value::EntityList(list)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<SmolStr, Value>> for Value {
    fn from(map: IndexMap<SmolStr, Value>) -> Self {
        Value::Object(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}
