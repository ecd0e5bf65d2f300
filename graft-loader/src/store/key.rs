//! Store key derivation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fmt;

use crate::error::{LoadError, LoadResult};
use crate::model::Identifier;

/// Key of a cached collection: base64 of the canonical JSON of its query
/// parameters.
///
/// Object keys are sorted recursively first, so parameter maps that differ
/// only in key order share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    /// Derive the key for a parameter map.
    pub fn from_params(params: &serde_json::Value) -> LoadResult<Self> {
        let canonical = canonical_json(params);
        let encoded = serde_json::to_vec(&canonical).map_err(|e| {
            LoadError::invalid_store_key(format!("parameters cannot be encoded: {}", e))
        })?;
        Ok(Self(BASE64.encode(encoded)))
    }

    /// The encoded key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Addresses a Store entry within one type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// A single entity.
    Id(Identifier),
    /// A collection produced by a query.
    Query(QueryKey),
}

impl StoreKey {
    /// Key for a collection, derived from its query parameters.
    pub fn query(params: &serde_json::Value) -> LoadResult<Self> {
        QueryKey::from_params(params).map(StoreKey::Query)
    }
}

impl From<Identifier> for StoreKey {
    fn from(id: Identifier) -> Self {
        StoreKey::Id(id)
    }
}

impl From<&Identifier> for StoreKey {
    fn from(id: &Identifier) -> Self {
        StoreKey::Id(id.clone())
    }
}

impl From<i64> for StoreKey {
    fn from(id: i64) -> Self {
        StoreKey::Id(id.into())
    }
}

impl From<i32> for StoreKey {
    fn from(id: i32) -> Self {
        StoreKey::Id(id.into())
    }
}

impl From<&str> for StoreKey {
    fn from(id: &str) -> Self {
        StoreKey::Id(id.into())
    }
}

impl From<QueryKey> for StoreKey {
    fn from(key: QueryKey) -> Self {
        StoreKey::Query(key)
    }
}

/// Copy a JSON value with every object's keys sorted.
pub(crate) fn canonical_json(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical_json(v)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonical_json).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a = QueryKey::from_params(&json!({"status": "published", "author": {"id": 1, "type": "user"}}))
            .unwrap();
        let b = QueryKey::from_params(&json!({"author": {"type": "user", "id": 1}, "status": "published"}))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_params_differ() {
        let a = QueryKey::from_params(&json!({"status": "published"})).unwrap();
        let b = QueryKey::from_params(&json!({"status": "draft"})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_is_base64_of_canonical_json() {
        let key = QueryKey::from_params(&json!({"b": 1, "a": [2]})).unwrap();
        let decoded = BASE64.decode(key.as_str()).unwrap();
        assert_eq!(decoded, br#"{"a":[2],"b":1}"#.to_vec());
    }

    #[test]
    fn test_store_key_conversions() {
        assert_eq!(StoreKey::from(1), StoreKey::Id(Identifier::Int(1)));
        assert_eq!(StoreKey::from("x"), StoreKey::Id(Identifier::from("x")));
    }
}
