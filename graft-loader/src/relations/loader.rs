//! Relation loading orchestration.

use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::path::{IntoRelations, Relations};
use super::plan::LoadPlan;
use super::walker::GraphWalker;
use crate::config::LoaderConfig;
use crate::error::{LoadError, LoadResult};
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::{Entity, EntityList, Reference, Value, ingest};
use crate::serialize::Serializer;
use crate::store::Store;

/// Summary of one [`Loader::load`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Walk/fetch/splice rounds that found work.
    pub rounds: usize,
    /// Calls made to the fetcher.
    pub fetch_calls: usize,
    /// Entities returned by the fetcher.
    pub fetched: usize,
    /// Queued references already present in the store.
    pub cache_hits: usize,
    /// References replaced by entities.
    pub spliced: usize,
    /// Requested ids the fetcher did not return.
    pub missing: usize,
}

impl LoadReport {
    /// Whether the load fetched nothing.
    pub fn is_noop(&self) -> bool {
        self.fetch_calls == 0
    }
}

/// Resolves relation paths across a graph, batching fetches per type and
/// relation set and deduplicating against a request-scoped [`Store`].
///
/// ```rust,ignore
/// let mut loader = Loader::new(registry).with_batch_size(100);
/// let mut article = loader.ingest(&json)?;
/// let report = loader.load(&mut article, "author.profile,categories").await?;
/// let document = loader.serializer().to_flat(&article);
/// ```
pub struct Loader<F: Fetcher> {
    fetcher: F,
    store: Store,
    config: LoaderConfig,
}

impl<F: Fetcher> Loader<F> {
    /// Create a loader with an empty store.
    pub fn new(fetcher: F) -> Self {
        Self::with_store(fetcher, Store::new())
    }

    /// Create a loader around an existing store.
    pub fn with_store(fetcher: F, store: Store) -> Self {
        Self {
            fetcher,
            store,
            config: LoaderConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum ids per fetch call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = Some(batch_size);
        self
    }

    /// Set the locale forwarded to the fetcher.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.config.locale = Some(locale.into());
        self
    }

    /// Set the round limit.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.config.max_rounds = max_rounds;
        self
    }

    /// Run each round's batches concurrently.
    pub fn with_concurrent_fetches(mut self, enabled: bool) -> Self {
        self.config.concurrent_fetches = enabled;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// The store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Mutable access to the store.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Consume the loader, keeping its store.
    pub fn into_store(self) -> Store {
        self.store
    }

    /// Ingest raw JSON into a graph backed by this loader's store.
    pub fn ingest(&mut self, json: &serde_json::Value) -> LoadResult<Value> {
        ingest(json, &mut self.store)
    }

    /// A serializer reading inclusion state from this loader's store.
    pub fn serializer(&self) -> Serializer<'_> {
        Serializer::new(&self.store)
    }

    /// Resolve `relations` across `root` in place.
    ///
    /// Each round walks the graph, serves what it can from the store,
    /// fetches the rest in one call per `(type, relations)` bucket (or per
    /// `batch_size` chunk) and splices results back in. Rounds repeat until
    /// a walk finds nothing left to fetch. Ids a fetcher does not return
    /// stay as references and are not requested again.
    pub async fn load(
        &mut self,
        root: &mut Value,
        relations: impl IntoRelations,
    ) -> LoadResult<LoadReport> {
        let relations = relations.into_relations()?;
        self.config.validate()?;

        let mut report = LoadReport::default();
        loop {
            let (plan, diverged) = self.plan(root, &relations);
            if plan.is_empty() {
                if diverged {
                    report.spliced += self.splice(root, &relations);
                }
                break;
            }
            if report.rounds >= self.config.max_rounds {
                warn!(
                    max_rounds = self.config.max_rounds,
                    pending = plan.len(),
                    relations = %relations,
                    "round limit reached with references still unresolved"
                );
                break;
            }
            report.rounds += 1;

            let requests = self.partition(&plan, &mut report)?;
            debug!(
                round = report.rounds,
                queued = plan.len(),
                batches = requests.len(),
                cache_hits = report.cache_hits,
                "load round planned"
            );

            let results = self.fetch_all(&requests).await?;
            for (request, list) in requests.iter().zip(results) {
                self.absorb(request, list, &mut report)?;
            }

            report.spliced += self.splice(root, &relations);
        }

        debug!(
            rounds = report.rounds,
            fetch_calls = report.fetch_calls,
            fetched = report.fetched,
            spliced = report.spliced,
            missing = report.missing,
            "load finished"
        );
        Ok(report)
    }

    /// Walk the graph and mark reached entities as included. Also reports
    /// whether any reached entity is a different instance than the one the
    /// store holds for its identity.
    fn plan(&mut self, root: &Value, relations: &Relations) -> (LoadPlan, bool) {
        let mut plan = LoadPlan::new();
        GraphWalker::new(&self.store, &mut plan).queue(root, relations);

        let mut diverged = false;
        for entity in plan.included() {
            let same = self
                .store
                .peek(entity.reference())
                .map(|stored| Arc::ptr_eq(stored, entity));
            match same {
                Some(same) => {
                    diverged |= !same;
                    self.store.mark_included(entity.reference().clone());
                }
                None => self.store.put_entity(entity.clone(), true),
            }
        }
        (plan, diverged)
    }

    fn partition(
        &mut self,
        plan: &LoadPlan,
        report: &mut LoadReport,
    ) -> LoadResult<Vec<FetchRequest>> {
        let mut requests = Vec::new();

        for entry in plan.entries() {
            let mut pending = Vec::with_capacity(entry.ids.len());
            for id in entry.ids {
                let reference = Reference::new(id, entry.type_name.clone())?;
                if self.store.get_entity(&reference).is_some() {
                    report.cache_hits += 1;
                    self.store.mark_included(reference);
                } else {
                    pending.push(reference.id().clone());
                }
            }
            if pending.is_empty() {
                continue;
            }

            let chunk = self.config.batch_size.unwrap_or(pending.len()).max(1);
            for ids in pending.chunks(chunk) {
                requests.push(
                    FetchRequest::new(entry.type_name.clone(), ids.to_vec(), entry.relations.clone())
                        .with_locale(self.config.locale.clone()),
                );
            }
        }
        Ok(requests)
    }

    async fn fetch_all(&self, requests: &[FetchRequest]) -> LoadResult<Vec<EntityList>> {
        if self.config.concurrent_fetches {
            return try_join_all(requests.iter().map(|request| self.fetch_one(request))).await;
        }

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.fetch_one(request).await?);
        }
        Ok(results)
    }

    async fn fetch_one(&self, request: &FetchRequest) -> LoadResult<EntityList> {
        debug!(
            type_name = %request.type_name,
            ids = request.ids.len(),
            relations = %request.relations,
            fingerprint = request.relations.fingerprint(),
            "fetching batch"
        );

        self.fetcher
            .fetch(request)
            .await
            .map_err(|err| annotate(err, request))
    }

    fn absorb(
        &mut self,
        request: &FetchRequest,
        list: EntityList,
        report: &mut LoadReport,
    ) -> LoadResult<()> {
        report.fetch_calls += 1;
        report.fetched += list.entities().count();
        self.store.put_list(&list, true)?;

        for id in &request.ids {
            if self.store.has(id, &request.type_name) {
                continue;
            }
            let reference = Reference::new(id.clone(), request.type_name.clone())?;
            debug!(reference = %reference, "fetcher did not return requested entity");
            self.store.mark_missing(reference);
            report.missing += 1;
        }
        Ok(())
    }

    /// Replace every reference in scope that the store can resolve.
    ///
    /// Entity locks are taken one at a time: entities found below a field
    /// are queued rather than descended while the parent is locked.
    fn splice(&self, root: &mut Value, relations: &Relations) -> usize {
        let mut spliced = 0;
        let mut frontier: Vec<(Arc<Entity>, Relations)> = Vec::new();
        let mut visited: HashSet<(usize, Relations)> = HashSet::new();

        self.splice_value(root, relations, &mut frontier, &mut spliced);

        while let Some((entity, relations)) = frontier.pop() {
            if !visited.insert((Arc::as_ptr(&entity) as usize, relations.clone())) {
                continue;
            }
            let mut fields = entity.fields_mut();
            for (name, value) in fields.iter_mut() {
                if let Some(nested) = relations.nested(name) {
                    self.splice_value(value, &nested, &mut frontier, &mut spliced);
                }
            }
        }
        spliced
    }

    fn splice_value(
        &self,
        value: &mut Value,
        relations: &Relations,
        frontier: &mut Vec<(Arc<Entity>, Relations)>,
        spliced: &mut usize,
    ) {
        match value {
            Value::Reference(reference) => {
                let Some(entity) = self.store.peek(reference).cloned() else {
                    return;
                };
                *value = Value::Entity(entity.clone());
                *spliced += 1;
                if !relations.is_empty() {
                    frontier.push((entity, relations.clone()));
                }
            }
            Value::Entity(entity) => {
                // Converge stray copies on the instance the store holds.
                let entity = match self.store.peek(entity.reference()) {
                    Some(stored) if !Arc::ptr_eq(stored, entity) => {
                        let stored = stored.clone();
                        *value = Value::Entity(stored.clone());
                        *spliced += 1;
                        stored
                    }
                    _ => entity.clone(),
                };
                if !relations.is_empty() {
                    frontier.push((entity, relations.clone()));
                }
            }
            Value::EntityList(list) => {
                for item in list.items_mut() {
                    self.splice_value(item, relations, frontier, spliced);
                }
            }
            Value::List(items) => {
                for item in items.iter_mut() {
                    self.splice_value(item, relations, frontier, spliced);
                }
            }
            Value::Object(map) => {
                for (name, item) in map.iter_mut() {
                    if let Some(nested) = relations.nested(name) {
                        self.splice_value(item, &nested, frontier, spliced);
                    }
                }
            }
            Value::Scalar(_) => {}
        }
    }
}

fn annotate(mut err: LoadError, request: &FetchRequest) -> LoadError {
    if err.context.operation.is_none() {
        err.context.operation = Some("fetching relations".to_string());
    }
    if err.context.type_name.is_none() {
        err.context.type_name = Some(request.type_name.to_string());
    }
    if err.context.relations.is_none() {
        err.context.relations = Some(request.relations.to_string());
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::Identifier;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Returns every requested id except those listed in `absent`.
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<FetchRequest>>,
        absent: Vec<Identifier>,
        fail: bool,
        chain: bool,
    }

    #[async_trait]
    impl Fetcher for Recording {
        async fn fetch(&self, request: &FetchRequest) -> LoadResult<EntityList> {
            self.calls.lock().push(request.clone());
            if self.fail {
                return Err(LoadError::fetch_failed(request.type_name.as_str(), "backend down"));
            }

            let mut list = EntityList::typed(request.type_name.clone());
            for id in &request.ids {
                if self.absent.contains(id) {
                    continue;
                }
                let entity = Entity::new(id.clone(), request.type_name.clone())?
                    .with_field("name", format!("{} {}", request.type_name, id))?;
                if let (true, Identifier::Int(i)) = (self.chain, id) {
                    entity.set("next", Reference::new(i + 1, request.type_name.clone())?)?;
                }
                list.push(entity.into_shared())?;
            }
            Ok(list)
        }
    }

    fn article() -> serde_json::Value {
        json!({
            "id": 10, "type": "article", "title": "Hello",
            "author": {"id": 15, "type": "user"},
            "categories": [{"id": 21, "type": "category"}, {"id": 22, "type": "category"}]
        })
    }

    #[tokio::test]
    async fn test_loads_requested_relation_only() {
        let mut loader = Loader::new(Recording::default());
        let mut root = loader.ingest(&article()).unwrap();

        let report = loader.load(&mut root, "categories").await.unwrap();

        let calls = loader.fetcher().calls.lock().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].type_name, "category");
        assert_eq!(calls[0].ids, vec![Identifier::Int(21), Identifier::Int(22)]);
        assert!(calls[0].relations.is_empty());

        let entity = root.as_entity().unwrap();
        assert!(entity.get("author").unwrap().is_reference());
        let categories = entity.get("categories").unwrap();
        assert!(categories.as_entity_list().unwrap().items().iter().all(Value::resolved));

        assert_eq!(report.rounds, 1);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.spliced, 2);
    }

    #[tokio::test]
    async fn test_second_load_is_a_noop() {
        let mut loader = Loader::new(Recording::default());
        let mut root = loader.ingest(&article()).unwrap();

        loader.load(&mut root, "author,categories").await.unwrap();
        let report = loader.load(&mut root, "author,categories").await.unwrap();

        assert!(report.is_noop());
        assert_eq!(report.rounds, 0);
        assert_eq!(loader.fetcher().calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_ids_stay_references() {
        let fetcher = Recording {
            absent: vec![Identifier::Int(15)],
            ..Default::default()
        };
        let mut loader = Loader::new(fetcher);
        let mut root = loader.ingest(&article()).unwrap();

        let report = loader.load(&mut root, "author").await.unwrap();
        assert_eq!(report.missing, 1);
        assert!(root.as_entity().unwrap().get("author").unwrap().is_reference());

        let again = loader.load(&mut root, "author").await.unwrap();
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn test_batch_size_chunks_requests() {
        let mut loader = Loader::new(Recording::default()).with_batch_size(1);
        let mut root = loader.ingest(&article()).unwrap();

        let report = loader.load(&mut root, "categories").await.unwrap();
        assert_eq!(report.fetch_calls, 2);
        for call in loader.fetcher().calls.lock().iter() {
            assert_eq!(call.ids.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_concurrent_fetches() {
        let mut loader = Loader::new(Recording::default()).with_concurrent_fetches(true);
        let mut root = loader.ingest(&article()).unwrap();

        let report = loader.load(&mut root, "author,categories").await.unwrap();
        assert_eq!(report.fetch_calls, 2);
        assert_eq!(report.spliced, 3);
    }

    #[tokio::test]
    async fn test_cache_hits_skip_the_fetcher() {
        let mut loader = Loader::new(Recording::default());
        loader
            .store_mut()
            .put_entity(Entity::new(15, "user").unwrap().into_shared(), false);
        let mut root = loader.ingest(&article()).unwrap();

        let report = loader.load(&mut root, "author").await.unwrap();
        assert_eq!(report.cache_hits, 1);
        assert!(report.is_noop());
        assert!(root.as_entity().unwrap().get("author").unwrap().resolved());
        assert!(loader.store().includes(&Reference::new(15, "user").unwrap()));
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_with_context() {
        let fetcher = Recording {
            fail: true,
            ..Default::default()
        };
        let mut loader = Loader::new(fetcher);
        let mut root = loader.ingest(&article()).unwrap();

        let err = loader.load(&mut root, "categories").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::FetchFailed);
        assert_eq!(err.context.relations.as_deref(), Some(""));
        assert_eq!(err.context.operation.as_deref(), Some("fetching relations"));
    }

    #[tokio::test]
    async fn test_malformed_relations_fail_before_fetching() {
        let mut loader = Loader::new(Recording::default());
        let mut root = loader.ingest(&article()).unwrap();

        let err = loader.load(&mut root, "author..profile").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedRelationPath);
        assert!(loader.fetcher().calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rounds_follow_fetched_references() {
        let fetcher = Recording {
            chain: true,
            ..Default::default()
        };
        let mut loader = Loader::new(fetcher);
        let mut root = loader.ingest(&article()).unwrap();

        let report = loader.load(&mut root, "author.next.next").await.unwrap();
        assert_eq!(report.rounds, 3);
        assert_eq!(report.fetch_calls, 3);

        let author = root.as_entity().unwrap().get("author").unwrap();
        let next = author.as_entity().unwrap().get("next").unwrap();
        let last = next.as_entity().unwrap().get("next").unwrap();
        assert_eq!(last.as_entity().unwrap().id(), &Identifier::Int(17));
        assert!(last.as_entity().unwrap().get("next").unwrap().is_reference());
    }

    #[tokio::test]
    async fn test_round_limit() {
        let fetcher = Recording {
            chain: true,
            ..Default::default()
        };
        let mut loader = Loader::new(fetcher).with_max_rounds(1);
        let mut root = loader.ingest(&article()).unwrap();

        let report = loader.load(&mut root, 3u32).await.unwrap();
        assert_eq!(report.rounds, 1);

        let author = root.as_entity().unwrap().get("author").unwrap();
        assert!(author.as_entity().unwrap().get("next").unwrap().is_reference());
    }
}
