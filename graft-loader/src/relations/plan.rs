//! The load plan: what one round has to fetch.

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use std::sync::Arc;

use super::path::Relations;
use crate::model::{Entity, Identifier, Reference};

/// Ids to fetch, grouped by type and then by relation set.
///
/// Two relation sets for the same type are never merged: each becomes its
/// own fetch call. Insertion order is kept so fetches happen in the order
/// references were discovered.
#[derive(Debug, Default)]
pub struct LoadPlan {
    buckets: IndexMap<SmolStr, IndexMap<Relations, IndexSet<Identifier>>>,
    included: IndexMap<Reference, Arc<Entity>>,
}

/// One fetch call's worth of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Entity type.
    pub type_name: SmolStr,
    /// Relations to resolve below each fetched entity.
    pub relations: Relations,
    /// Ids in discovery order.
    pub ids: Vec<Identifier>,
}

impl LoadPlan {
    /// Create an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reference under a relation set. Returns `false` if it was
    /// already queued there.
    pub fn add(&mut self, reference: &Reference, relations: &Relations) -> bool {
        let bucket = self.buckets.entry(reference.type_key().clone()).or_default();
        if let Some(ids) = bucket.get_mut(relations) {
            return ids.insert(reference.id().clone());
        }
        bucket
            .entry(relations.clone())
            .or_default()
            .insert(reference.id().clone())
    }

    /// Whether a reference is queued under a relation set.
    pub fn contains(&self, reference: &Reference, relations: &Relations) -> bool {
        self.buckets
            .get(reference.type_name())
            .and_then(|bucket| bucket.get(relations))
            .is_some_and(|ids| ids.contains(reference.id()))
    }

    /// Record an entity reached through a relation field.
    pub fn include(&mut self, entity: &Arc<Entity>) {
        self.included
            .entry(entity.reference().clone())
            .or_insert_with(|| entity.clone());
    }

    /// Entities reached through relation fields, in discovery order.
    pub fn included(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.included.values()
    }

    /// Whether nothing needs fetching.
    pub fn is_empty(&self) -> bool {
        self.buckets
            .values()
            .all(|bucket| bucket.values().all(IndexSet::is_empty))
    }

    /// Number of queued `(type, relations, id)` triples.
    pub fn len(&self) -> usize {
        self.buckets
            .values()
            .flat_map(IndexMap::values)
            .map(IndexSet::len)
            .sum()
    }

    /// Number of distinct `(type, relations)` buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.values().map(IndexMap::len).sum()
    }

    /// All buckets in discovery order.
    pub fn entries(&self) -> Vec<PlanEntry> {
        self.buckets
            .iter()
            .flat_map(|(type_name, bucket)| {
                bucket.iter().map(move |(relations, ids)| PlanEntry {
                    type_name: type_name.clone(),
                    relations: relations.clone(),
                    ids: ids.iter().cloned().collect(),
                })
            })
            .filter(|entry| !entry.ids.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(id: i64, type_name: &str) -> Reference {
        Reference::new(id, type_name).unwrap()
    }

    #[test]
    fn test_groups_by_type_and_relations() {
        let mut plan = LoadPlan::new();
        let none = Relations::none();
        let profile = Relations::parse("profile").unwrap();

        assert!(plan.add(&reference(1, "user"), &none));
        assert!(plan.add(&reference(2, "user"), &none));
        assert!(!plan.add(&reference(1, "user"), &none));
        assert!(plan.add(&reference(1, "user"), &profile));
        assert!(plan.add(&reference(21, "category"), &none));

        assert_eq!(plan.len(), 4);
        assert_eq!(plan.bucket_count(), 3);

        let entries = plan.entries();
        assert_eq!(entries[0].type_name, "user");
        assert_eq!(entries[0].ids, vec![Identifier::Int(1), Identifier::Int(2)]);
        assert_eq!(entries[1].relations, profile);
        assert_eq!(entries[2].type_name, "category");
        assert!(plan.contains(&reference(1, "user"), &profile));
        assert!(!plan.contains(&reference(2, "user"), &profile));
    }

    #[test]
    fn test_include_dedupes() {
        let mut plan = LoadPlan::new();
        let user = Entity::new(1, "user").unwrap().into_shared();
        plan.include(&user);
        plan.include(&user);
        assert_eq!(plan.included().count(), 1);
        assert!(plan.is_empty());
    }
}
