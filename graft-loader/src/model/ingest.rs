//! Turning raw JSON into a typed graph.
//!
//! Classification happens once, here:
//!
//! | JSON                                    | Value                 |
//! |-----------------------------------------|-----------------------|
//! | object with exactly `id` and `type`     | `Reference`           |
//! | object with `id`, `type` and more       | `Entity`              |
//! | object with only one of `id` / `type`   | `InvalidEntity` error |
//! | object with neither                     | `Object`              |
//! | array of identity-carrying objects      | `EntityList`          |
//! | any other array                         | `List`                |

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;

use super::entity::{Entity, EntityList, ID_FIELD, Identifier, Reference, TYPE_FIELD};
use super::value::{Scalar, Value};
use crate::error::{LoadError, LoadResult};
use crate::store::Store;

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Classify a JSON document, offering every entity and entity list to the
/// store with `include = false`.
pub fn ingest(json: &serde_json::Value, store: &mut Store) -> LoadResult<Value> {
    Ingestor::new(Some(store)).value(json)
}

/// Ingest a document whose root must be a full entity.
pub fn ingest_entity(json: &serde_json::Value, store: &mut Store) -> LoadResult<Arc<Entity>> {
    match ingest(json, store)? {
        Value::Entity(entity) => Ok(entity),
        other => Err(LoadError::invalid_entity(format!(
            "expected an entity at the root, got {}",
            other.kind()
        ))
        .with_context("ingesting an entity")),
    }
}

/// Ingest a document whose root must be an array of entities and references.
pub fn ingest_list(json: &serde_json::Value, store: &mut Store) -> LoadResult<EntityList> {
    let items = json.as_array().ok_or_else(|| {
        LoadError::invalid_entity("expected an array at the root").with_context("ingesting a list")
    })?;
    Ingestor::new(Some(store)).entity_list(items)
}

/// Rebuild a graph from primary data plus a table of entity bodies, sharing
/// one instance per `(type, id)`.
pub(crate) fn reassemble<'a>(
    data: &'a serde_json::Value,
    bodies: impl IntoIterator<Item = (Reference, &'a JsonMap)>,
) -> LoadResult<Value> {
    let mut ingestor = Ingestor::new(None);
    ingestor.bodies.extend(bodies);

    let primary: Vec<&serde_json::Value> = match data {
        serde_json::Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for item in primary {
        if let serde_json::Value::Object(map) = item {
            if map.len() > 2 {
                if let Some(reference) = identity(map)? {
                    ingestor.bodies.insert(reference, map);
                }
            }
        }
    }

    ingestor.value(data)
}

/// Extract the identity of an object, if it carries one.
pub(crate) fn identity(map: &JsonMap) -> LoadResult<Option<Reference>> {
    match (map.get(ID_FIELD), map.get(TYPE_FIELD)) {
        (None, None) => Ok(None),
        (Some(id), Some(type_name)) => {
            let id = Identifier::from_json(id).ok_or_else(|| {
                LoadError::invalid_entity(format!(
                    "`id` must be an integer or a non-empty string, got {}",
                    id
                ))
                .with_field(ID_FIELD)
            })?;
            let type_name = type_name
                .as_str()
                .ok_or_else(|| {
                    LoadError::invalid_entity("`type` must be a string").with_field(TYPE_FIELD)
                })?;
            Reference::new(id, type_name).map(Some)
        }
        (Some(_), None) => Err(LoadError::invalid_entity("object has an `id` but no `type`")
            .with_field(TYPE_FIELD)),
        (None, Some(_)) => Err(LoadError::invalid_entity("object has a `type` but no `id`")
            .with_field(ID_FIELD)),
    }
}

fn has_identity(json: &serde_json::Value) -> bool {
    json.as_object()
        .is_some_and(|map| map.contains_key(ID_FIELD) || map.contains_key(TYPE_FIELD))
}

struct Ingestor<'a> {
    store: Option<&'a mut Store>,
    bodies: HashMap<Reference, &'a JsonMap>,
    built: HashMap<Reference, Arc<Entity>>,
}

impl<'a> Ingestor<'a> {
    fn new(store: Option<&'a mut Store>) -> Self {
        Self {
            store,
            bodies: HashMap::new(),
            built: HashMap::new(),
        }
    }

    fn value(&mut self, json: &'a serde_json::Value) -> LoadResult<Value> {
        Ok(match json {
            serde_json::Value::Null => Value::Scalar(Scalar::Null),
            serde_json::Value::Bool(b) => Value::Scalar(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Scalar(Scalar::Int(i)),
                None => Value::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            serde_json::Value::String(s) => Value::Scalar(Scalar::String(s.clone())),
            serde_json::Value::Array(items) => {
                if !items.is_empty() && items.iter().all(has_identity) {
                    Value::EntityList(self.entity_list(items)?)
                } else {
                    Value::List(
                        items
                            .iter()
                            .map(|item| self.value(item))
                            .collect::<LoadResult<_>>()?,
                    )
                }
            }
            serde_json::Value::Object(map) => self.object(map)?,
        })
    }

    fn object(&mut self, map: &'a JsonMap) -> LoadResult<Value> {
        let Some(reference) = identity(map)? else {
            let mut fields = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                fields.insert(SmolStr::new(key), self.value(value)?);
            }
            return Ok(Value::Object(fields));
        };

        if map.len() == 2 {
            return Ok(match self.resolve_body(&reference)? {
                Some(entity) => Value::Entity(entity),
                None => Value::Reference(reference),
            });
        }

        self.entity(reference, map).map(Value::Entity)
    }

    /// Build the entity for `map`, or fold `map` into the instance already
    /// built for the same identity in this call or held by the store, so a
    /// `(type, id)` is never split across instances.
    fn entity(&mut self, reference: Reference, map: &'a JsonMap) -> LoadResult<Arc<Entity>> {
        let existing = self.built.get(&reference).cloned().or_else(|| {
            self.store
                .as_deref()
                .and_then(|store| store.peek(&reference).cloned())
        });

        // Registered before its fields are built so cycles resolve to it.
        let entity = match existing {
            Some(entity) => entity,
            None => Arc::new(Entity::from_reference(reference.clone())),
        };
        self.built.insert(reference, entity.clone());

        for (key, json) in map {
            if key == ID_FIELD || key == TYPE_FIELD {
                continue;
            }
            let value = self.value(json)?;
            let mut fields = entity.fields_mut();
            // A thin copy never downgrades a field that is already resolved.
            let keeps_resolved = value.is_reference()
                && fields
                    .get(key.as_str())
                    .is_some_and(|current| current.resolved() && current.identity() == value.identity());
            if !keeps_resolved {
                fields.insert(SmolStr::new(key), value);
            }
        }

        if let Some(store) = self.store.as_deref_mut() {
            store.put_entity(entity.clone(), false);
        }
        Ok(entity)
    }

    fn resolve_body(&mut self, reference: &Reference) -> LoadResult<Option<Arc<Entity>>> {
        if let Some(entity) = self.built.get(reference) {
            return Ok(Some(entity.clone()));
        }
        match self.bodies.get(reference).copied() {
            Some(body) => self.entity(reference.clone(), body).map(Some),
            None => Ok(None),
        }
    }

    fn entity_list(&mut self, items: &'a [serde_json::Value]) -> LoadResult<EntityList> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let value = match item {
                serde_json::Value::Object(map) => self.object(map)?,
                other => {
                    return Err(LoadError::invalid_entity(format!(
                        "entity lists hold objects with `id` and `type`, got {}",
                        other
                    )));
                }
            };
            if !matches!(value, Value::Entity(_) | Value::Reference(_)) {
                return Err(LoadError::invalid_entity(
                    "entity lists hold objects with `id` and `type`",
                ));
            }
            values.push(value);
        }

        let mut types = values.iter().filter_map(Value::identity).map(Reference::type_key);
        let first = types.next().cloned();
        let element_type = first.filter(|first| types.all(|t| t == first));

        let mut list = EntityList::new(element_type);
        for value in values {
            list.push(value)?;
        }

        if let Some(store) = self.store.as_deref_mut() {
            store.put_list(&list, false)?;
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thin_object_is_reference() {
        let mut store = Store::new();
        let value = ingest(&json!({"id": 15, "type": "user"}), &mut store).unwrap();
        assert_eq!(
            value.as_reference(),
            Some(&Reference::new(15, "user").unwrap())
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_full_object_is_stored_entity() {
        let mut store = Store::new();
        let value = ingest(
            &json!({"id": 10, "type": "article", "title": "Hi", "author": {"id": 15, "type": "user"}}),
            &mut store,
        )
        .unwrap();

        let entity = value.as_entity().unwrap();
        assert_eq!(entity.get("title"), Some(Value::from("Hi")));
        assert!(entity.get("author").unwrap().is_reference());
        assert!(store.has(10, "article"));
        assert!(!store.includes(entity.reference()));
    }

    #[test]
    fn test_partial_identity_is_rejected() {
        let mut store = Store::new();
        let err = ingest(&json!({"id": 1, "name": "x"}), &mut store).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::InvalidEntity);
        assert!(ingest(&json!({"type": "user"}), &mut store).is_err());
        assert!(ingest(&json!({"id": "", "type": "user"}), &mut store).is_err());
    }

    #[test]
    fn test_plain_object_and_list() {
        let mut store = Store::new();
        let value = ingest(&json!({"fields": {"tags": [1, 2]}}), &mut store).unwrap();
        let object = value.as_object().unwrap();
        let fields = object["fields"].as_object().unwrap();
        assert_eq!(fields["tags"].as_list().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_homogeneous_array_is_typed_list() {
        let mut store = Store::new();
        let list = ingest_list(
            &json!([{"id": 21, "type": "category"}, {"id": 22, "type": "category", "name": "B"}]),
            &mut store,
        )
        .unwrap();

        assert_eq!(list.element_type(), Some("category"));
        assert_eq!(list.len(), 2);
        assert_eq!(list.entities().count(), 1);
        assert!(store.has(22, "category"));
    }

    #[test]
    fn test_mixed_array_is_heterogeneous_list() {
        let mut store = Store::new();
        let value = ingest(
            &json!([{"id": 1, "type": "user"}, {"id": 2, "type": "company"}]),
            &mut store,
        )
        .unwrap();
        let list = value.as_entity_list().unwrap();
        assert_eq!(list.element_type(), None);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_array_mixing_entities_and_scalars_is_rejected() {
        let mut store = Store::new();
        assert!(ingest(&json!([{"id": 1, "type": "user"}, 3]), &mut store).is_ok());
        assert!(ingest_list(&json!([{"id": 1, "type": "user"}, 3]), &mut store).is_err());
    }

    #[test]
    fn test_ingest_entity_requires_entity() {
        let mut store = Store::new();
        assert!(ingest_entity(&json!({"id": 1, "type": "user"}), &mut store).is_err());
        assert!(ingest_entity(&json!({"id": 1, "type": "user", "name": "A"}), &mut store).is_ok());
    }

    #[test]
    fn test_repeated_copies_fold_into_one_instance() {
        let mut store = Store::new();
        let value = ingest(
            &json!([
                {"id": 10, "type": "article", "author": {"id": 1, "type": "user", "name": "Ann"}},
                {"id": 11, "type": "article", "author": {"id": 1, "type": "user", "email": "ann@example.com"}},
                {"id": 12, "type": "article", "author": {"id": 1, "type": "user"}}
            ]),
            &mut store,
        )
        .unwrap();

        let list = value.as_entity_list().unwrap();
        let authors: Vec<Arc<Entity>> = list
            .entities()
            .map(|article| article.get("author").unwrap().as_entity().unwrap().clone())
            .collect();
        assert!(Arc::ptr_eq(&authors[0], &authors[1]));
        assert!(Arc::ptr_eq(&authors[1], &authors[2]));
        assert_eq!(authors[0].get("name"), Some(Value::from("Ann")));
        assert_eq!(authors[0].get("email"), Some(Value::from("ann@example.com")));
    }

    #[test]
    fn test_later_ingest_reuses_store_instance() {
        let mut store = Store::new();
        let first = ingest_entity(
            &json!({"id": 1, "type": "user", "manager": {"id": 2, "type": "user", "name": "Bo"}}),
            &mut store,
        )
        .unwrap();
        let second = ingest_entity(
            &json!({"id": 1, "type": "user", "name": "Ann", "manager": {"id": 2, "type": "user"}}),
            &mut store,
        )
        .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.get("name"), Some(Value::from("Ann")));
        // The thin copy does not undo the resolved manager.
        assert!(second.get("manager").unwrap().resolved());
    }

    #[test]
    fn test_reassemble_shares_instances() {
        let data = json!([
            {"id": 1, "type": "article", "author": {"id": 7, "type": "user"}},
            {"id": 2, "type": "article", "author": {"id": 7, "type": "user"}}
        ]);
        let body = json!({"id": 7, "type": "user", "name": "Ann", "best": {"id": 1, "type": "article"}});
        let body_map = body.as_object().unwrap();

        let value =
            reassemble(&data, vec![(Reference::new(7, "user").unwrap(), body_map)]).unwrap();
        let list = value.as_entity_list().unwrap();
        let first = list.items()[0].as_entity().unwrap().get("author").unwrap();
        let second = list.items()[1].as_entity().unwrap().get("author").unwrap();
        assert!(Arc::ptr_eq(
            first.as_entity().unwrap(),
            second.as_entity().unwrap()
        ));

        // The cycle back to the primary article resolves to the same instance.
        let best = first.as_entity().unwrap().get("best").unwrap();
        assert!(Arc::ptr_eq(
            best.as_entity().unwrap(),
            list.items()[0].as_entity().unwrap()
        ));
    }
}
