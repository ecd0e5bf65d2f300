//! Nested rendering.

use std::sync::Arc;

use super::{Serializer, stub};
use crate::model::{Entity, ID_FIELD, TYPE_FIELD, Value};

impl Serializer<'_> {
    /// Render `root` with every resolved entity inlined.
    ///
    /// Unresolved references stay `{"id", "type"}` stubs. An entity that is
    /// already being rendered further up the same path is emitted as a stub
    /// to break cycles.
    pub fn to_nested(&self, root: &Value) -> serde_json::Value {
        let mut path = Vec::new();
        self.nested_value(root, &mut path)
    }

    fn nested_value(&self, value: &Value, path: &mut Vec<*const Entity>) -> serde_json::Value {
        match value {
            Value::Scalar(scalar) => scalar.to_json(),
            Value::Reference(reference) => match self.resolve(value) {
                Some(entity) => self.nested_entity(&entity, path),
                None => reference.to_json(),
            },
            Value::Entity(entity) => self.nested_entity(entity, path),
            Value::EntityList(list) => serde_json::Value::Array(
                list.items()
                    .iter()
                    .map(|item| self.nested_value(item, path))
                    .collect(),
            ),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(|item| self.nested_value(item, path)).collect(),
            ),
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(name, item)| (name.to_string(), self.nested_value(item, path)))
                    .collect(),
            ),
        }
    }

    fn nested_entity(&self, entity: &Arc<Entity>, path: &mut Vec<*const Entity>) -> serde_json::Value {
        let ptr = Arc::as_ptr(entity);
        if path.contains(&ptr) {
            return stub(entity);
        }

        path.push(ptr);
        let fields = entity.fields();
        let mut map = serde_json::Map::with_capacity(fields.len() + 2);
        map.insert(ID_FIELD.to_string(), entity.id().to_json());
        map.insert(TYPE_FIELD.to_string(), entity.type_name().into());
        for (name, value) in fields.iter() {
            map.insert(name.to_string(), self.nested_value(value, path));
        }
        path.pop();
        drop(fields);

        self.finish(entity, map)
    }
}
