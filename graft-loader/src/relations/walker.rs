//! Discovering which references a relation set needs.

use std::collections::HashSet;
use std::sync::Arc;

use super::path::Relations;
use super::plan::LoadPlan;
use crate::graft_trace;
use crate::model::Value;
use crate::store::Store;

/// Walks a graph along a relation set and records the references to fetch.
///
/// Only fields named by the relation set are followed. Entities reached
/// through such a field are recorded as inclusion candidates and descended
/// further, so references below them are planned as well.
pub struct GraphWalker<'a> {
    store: &'a Store,
    plan: &'a mut LoadPlan,
    visited: HashSet<(usize, Relations)>,
}

impl<'a> GraphWalker<'a> {
    /// Create a walker filling `plan`. The store is consulted for ids known
    /// to be missing.
    pub fn new(store: &'a Store, plan: &'a mut LoadPlan) -> Self {
        Self {
            store,
            plan,
            visited: HashSet::new(),
        }
    }

    /// Queue every reference reachable from `node` along `relations`.
    pub fn queue(&mut self, node: &Value, relations: &Relations) {
        self.visit(node, relations, false);
    }

    fn visit(&mut self, node: &Value, relations: &Relations, related: bool) {
        match node {
            Value::Reference(reference) => {
                if self.store.is_missing(reference) {
                    graft_trace!(reference = %reference, "skipping reference known to be missing");
                    return;
                }
                if self.plan.add(reference, relations) {
                    graft_trace!(
                        reference = %reference,
                        relations = %relations,
                        "queued reference"
                    );
                }
            }
            Value::Entity(entity) => {
                if related {
                    self.plan.include(entity);
                }
                let key = (Arc::as_ptr(entity) as usize, relations.clone());
                if relations.is_empty() || !self.visited.insert(key) {
                    return;
                }

                let fields = entity.fields();
                for (name, value) in fields.iter() {
                    if let Some(nested) = relations.nested(name) {
                        self.visit(value, &nested, true);
                    }
                }
            }
            Value::EntityList(list) => {
                for item in list.items() {
                    self.visit(item, relations, related);
                }
            }
            Value::List(items) => {
                for item in items {
                    self.visit(item, relations, related);
                }
            }
            Value::Object(map) => {
                for (name, value) in map {
                    if let Some(nested) = relations.nested(name) {
                        self.visit(value, &nested, true);
                    }
                }
            }
            Value::Scalar(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Identifier, Reference, ingest};
    use serde_json::json;

    fn plan_for(json: serde_json::Value, relations: &str) -> (Store, LoadPlan) {
        let mut store = Store::new();
        let root = ingest(&json, &mut store).unwrap();
        let mut plan = LoadPlan::new();
        GraphWalker::new(&store, &mut plan).queue(&root, &Relations::parse(relations).unwrap());
        (store, plan)
    }

    #[test]
    fn test_only_requested_fields_are_queued() {
        let (_, plan) = plan_for(
            json!({
                "id": 10, "type": "article",
                "author": {"id": 15, "type": "user"},
                "categories": [{"id": 21, "type": "category"}, {"id": 22, "type": "category"}]
            }),
            "categories",
        );

        let entries = plan.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].type_name, "category");
        assert!(entries[0].relations.is_empty());
        assert_eq!(entries[0].ids, vec![Identifier::Int(21), Identifier::Int(22)]);
    }

    #[test]
    fn test_nested_relations_travel_with_reference() {
        let (_, plan) = plan_for(
            json!({"id": 10, "type": "article", "author": {"id": 15, "type": "user"}}),
            "author.profile",
        );

        let entries = plan.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relations.to_string(), "profile");
    }

    #[test]
    fn test_resolved_entities_are_descended_and_included() {
        let (_, plan) = plan_for(
            json!({
                "id": 10, "type": "article",
                "author": {"id": 15, "type": "user", "name": "Ann", "profile": {"id": 3, "type": "profile"}}
            }),
            "author.profile",
        );

        let entries = plan.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].type_name, "profile");
        assert_eq!(plan.included().count(), 1);
    }

    #[test]
    fn test_objects_are_walked_by_key() {
        let (_, plan) = plan_for(
            json!({"id": 10, "type": "article", "fields": {"author": {"id": 15, "type": "user"}}}),
            "fields.author",
        );
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_missing_references_are_skipped() {
        let mut store = Store::new();
        let root = ingest(
            &json!({"id": 10, "type": "article", "author": {"id": 15, "type": "user"}}),
            &mut store,
        )
        .unwrap();
        store.mark_missing(Reference::new(15, "user").unwrap());

        let mut plan = LoadPlan::new();
        GraphWalker::new(&store, &mut plan).queue(&root, &Relations::parse("author").unwrap());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_cycles_terminate() {
        let article = Entity::new(1, "article").unwrap().into_shared();
        let user = Entity::new(2, "user").unwrap().into_shared();
        article.set("author", user.clone()).unwrap();
        user.set("favourite", article.clone()).unwrap();

        let store = Store::new();
        let mut plan = LoadPlan::new();
        GraphWalker::new(&store, &mut plan).queue(&Value::Entity(article), &Relations::depth(50));
        assert!(plan.is_empty());
        assert_eq!(plan.included().count(), 2);
    }
}
