//! Table-driven type registry.
//!
//! Resolvers are grouped into named mappings. Each mapping binds type names
//! to resolvers and may carry a fallback callback consulted for types it
//! does not bind explicitly. Lookup for a type tries, in order:
//!
//! 1. the active mapping's explicit binding,
//! 2. the active mapping's fallback,
//! 3. the `"default"` mapping's explicit binding,
//! 4. the `"default"` mapping's fallback.
//!
//! No match is a configuration error, raised when the type is first
//! resolved.
//!
//! ```rust
//! use graft_loader::{Entity, EntityList, FetchRequest, Registry, resolver_fn};
//!
//! let registry = Registry::new().with_resolver(
//!     "user",
//!     resolver_fn(|request: FetchRequest| async move {
//!         let users = request
//!             .ids
//!             .iter()
//!             .map(|id| Entity::new(id.clone(), "user").map(Entity::into_shared))
//!             .collect::<Result<Vec<_>, _>>()?;
//!         EntityList::from_entities("user", users)
//!     }),
//! );
//! assert!(registry.resolver_for("user").is_ok());
//! assert!(registry.resolver_for("article").is_err());
//! ```

use async_trait::async_trait;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::{FetchRequest, Fetcher};
use crate::error::{LoadError, LoadResult};
use crate::model::{Entity, EntityList, Identifier, Value};
use crate::relations::Relations;

/// Name of the mapping consulted when the active one has no match.
pub const DEFAULT_MAPPING: &str = "default";

/// Resolves batches of one entity type.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve the entities named by `request`.
    async fn resolve(&self, request: &FetchRequest) -> LoadResult<EntityList>;
}

/// Callback producing a resolver for types without an explicit binding.
pub type FallbackFn = dyn Fn(&str) -> Option<Arc<dyn Resolver>> + Send + Sync;

/// A [`Resolver`] backed by an async closure.
pub struct ResolverFn<F>(F);

/// Adapt an async closure into a resolver.
pub fn resolver_fn<F, Fut>(f: F) -> ResolverFn<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = LoadResult<EntityList>> + Send + 'static,
{
    ResolverFn(f)
}

#[async_trait]
impl<F, Fut> Resolver for ResolverFn<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = LoadResult<EntityList>> + Send + 'static,
{
    async fn resolve(&self, request: &FetchRequest) -> LoadResult<EntityList> {
        (self.0)(request.clone()).await
    }
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    async fn resolve(&self, request: &FetchRequest) -> LoadResult<EntityList> {
        (**self).resolve(request).await
    }
}

#[derive(Default)]
struct Mapping {
    resolvers: HashMap<SmolStr, Arc<dyn Resolver>>,
    fallback: Option<Arc<FallbackFn>>,
}

impl Mapping {
    fn explicit(&self, type_name: &str) -> Option<Arc<dyn Resolver>> {
        self.resolvers.get(type_name).cloned()
    }

    fn fallback(&self, type_name: &str) -> Option<Arc<dyn Resolver>> {
        self.fallback.as_ref().and_then(|f| f(type_name))
    }
}

/// Maps entity types to resolvers. Implements [`Fetcher`].
pub struct Registry {
    mappings: HashMap<SmolStr, Mapping>,
    active: SmolStr,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry using the default mapping.
    pub fn new() -> Self {
        Self {
            mappings: HashMap::new(),
            active: SmolStr::new_static(DEFAULT_MAPPING),
        }
    }

    /// Bind a type in the default mapping.
    pub fn register(&mut self, type_name: impl Into<SmolStr>, resolver: impl Resolver + 'static) {
        self.register_in(DEFAULT_MAPPING, type_name, resolver);
    }

    /// Bind a type in a named mapping.
    pub fn register_in(
        &mut self,
        mapping: impl Into<SmolStr>,
        type_name: impl Into<SmolStr>,
        resolver: impl Resolver + 'static,
    ) {
        self.mappings
            .entry(mapping.into())
            .or_default()
            .resolvers
            .insert(type_name.into(), Arc::new(resolver));
    }

    /// Set the fallback of the default mapping.
    pub fn register_fallback<F>(&mut self, fallback: F)
    where
        F: Fn(&str) -> Option<Arc<dyn Resolver>> + Send + Sync + 'static,
    {
        self.register_fallback_in(DEFAULT_MAPPING, fallback);
    }

    /// Set the fallback of a named mapping.
    pub fn register_fallback_in<F>(&mut self, mapping: impl Into<SmolStr>, fallback: F)
    where
        F: Fn(&str) -> Option<Arc<dyn Resolver>> + Send + Sync + 'static,
    {
        self.mappings.entry(mapping.into()).or_default().fallback = Some(Arc::new(fallback));
    }

    /// Switch the active mapping.
    pub fn set_mapping(&mut self, mapping: impl Into<SmolStr>) {
        self.active = mapping.into();
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_resolver(mut self, type_name: impl Into<SmolStr>, resolver: impl Resolver + 'static) -> Self {
        self.register(type_name, resolver);
        self
    }

    /// Builder form of [`register_fallback`](Self::register_fallback).
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&str) -> Option<Arc<dyn Resolver>> + Send + Sync + 'static,
    {
        self.register_fallback(fallback);
        self
    }

    /// Builder form of [`set_mapping`](Self::set_mapping).
    pub fn with_mapping(mut self, mapping: impl Into<SmolStr>) -> Self {
        self.set_mapping(mapping);
        self
    }

    /// The active mapping key.
    pub fn active_mapping(&self) -> &str {
        &self.active
    }

    /// Find the resolver for a type.
    pub fn resolver_for(&self, type_name: &str) -> LoadResult<Arc<dyn Resolver>> {
        let active = self.mappings.get(&self.active);
        let default = self.mappings.get(DEFAULT_MAPPING);

        active
            .and_then(|m| m.explicit(type_name))
            .or_else(|| active.and_then(|m| m.fallback(type_name)))
            .or_else(|| default.and_then(|m| m.explicit(type_name)))
            .or_else(|| default.and_then(|m| m.fallback(type_name)))
            .ok_or_else(|| {
                LoadError::missing_resolver(type_name)
                    .with_context(format!("resolving with mapping '{}'", self.active))
            })
    }

    /// Resolve a single entity. `Ok(None)` when the resolver does not
    /// return it.
    pub async fn resolve_one(
        &self,
        type_name: &str,
        id: impl Into<Identifier>,
        relations: Relations,
        locale: Option<String>,
    ) -> LoadResult<Option<Arc<Entity>>> {
        let request = FetchRequest::new(type_name, vec![id.into()], relations).with_locale(locale);
        let list = self.fetch(&request).await?;
        Ok(list.entities().next().cloned())
    }

    /// Resolve a single entity, failing with `RecordNotFound` when absent.
    pub async fn require_one(
        &self,
        type_name: &str,
        id: impl Into<Identifier>,
        relations: Relations,
        locale: Option<String>,
    ) -> LoadResult<Arc<Entity>> {
        let id = id.into();
        self.resolve_one(type_name, id.clone(), relations, locale)
            .await?
            .ok_or_else(|| LoadError::not_found(type_name, id))
    }
}

#[async_trait]
impl Fetcher for Registry {
    async fn fetch(&self, request: &FetchRequest) -> LoadResult<EntityList> {
        let resolver = self.resolver_for(&request.type_name)?;
        let result = resolver.resolve(request).await?;

        let mut filtered = EntityList::typed(request.type_name.clone());
        if let Some(params) = result.params() {
            filtered = filtered.with_params(params.clone());
        }
        for entity in result.entities() {
            if entity.type_name() == request.type_name.as_str() && request.ids.contains(entity.id()) {
                filtered.push(Value::Entity(entity.clone()))?;
            }
        }
        Ok(filtered)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut mappings: Vec<_> = self
            .mappings
            .iter()
            .map(|(key, mapping)| {
                let mut types: Vec<_> = mapping.resolvers.keys().map(SmolStr::as_str).collect();
                types.sort_unstable();
                (key.as_str(), types, mapping.fallback.is_some())
            })
            .collect();
        mappings.sort_unstable_by(|a, b| a.0.cmp(b.0));

        f.debug_struct("Registry")
            .field("active", &self.active)
            .field("mappings", &mappings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    struct Named(&'static str);

    #[async_trait]
    impl Resolver for Named {
        async fn resolve(&self, request: &FetchRequest) -> LoadResult<EntityList> {
            let mut list = EntityList::heterogeneous();
            for id in &request.ids {
                let entity = Entity::new(id.clone(), request.type_name.clone())?
                    .with_field("source", self.0)?;
                list.push(entity.into_shared())?;
            }
            // Noise the registry must filter out.
            list.push(Entity::new(999, request.type_name.clone())?.into_shared())?;
            list.push(Entity::new(1, "other")?.into_shared())?;
            Ok(list)
        }
    }

    fn source_of(list: &EntityList) -> Option<Value> {
        list.entities().next().and_then(|e| e.get("source"))
    }

    #[tokio::test]
    async fn test_filters_results() {
        let registry = Registry::new().with_resolver("user", Named("explicit"));
        let request = FetchRequest::new(
            "user",
            vec![Identifier::Int(1), Identifier::Int(2)],
            Relations::none(),
        );

        let list = registry.fetch(&request).await.unwrap();
        let ids: Vec<_> = list.entities().map(|e| e.id().clone()).collect();
        assert_eq!(ids, vec![Identifier::Int(1), Identifier::Int(2)]);
        assert_eq!(list.element_type(), Some("user"));
    }

    #[tokio::test]
    async fn test_lookup_order() {
        let mut registry = Registry::new();
        registry.register("user", Named("default"));
        registry.register_fallback(|_| Some(Arc::new(Named("default-fallback")) as Arc<dyn Resolver>));
        registry.register_in("admin", "user", Named("admin"));
        registry.register_fallback_in("admin", |type_name| {
            (type_name == "company").then(|| Arc::new(Named("admin-fallback")) as Arc<dyn Resolver>)
        });

        let one = |type_name: &'static str| FetchRequest::new(type_name, vec![Identifier::Int(1)], Relations::none());

        let list = registry.fetch(&one("user")).await.unwrap();
        assert_eq!(source_of(&list), Some(Value::from("default")));

        registry.set_mapping("admin");
        assert_eq!(registry.active_mapping(), "admin");

        let list = registry.fetch(&one("user")).await.unwrap();
        assert_eq!(source_of(&list), Some(Value::from("admin")));

        let list = registry.fetch(&one("company")).await.unwrap();
        assert_eq!(source_of(&list), Some(Value::from("admin-fallback")));

        let list = registry.fetch(&one("article")).await.unwrap();
        assert_eq!(source_of(&list), Some(Value::from("default-fallback")));
    }

    #[tokio::test]
    async fn test_missing_resolver() {
        let registry = Registry::new();
        let request = FetchRequest::new("article", vec![Identifier::Int(1)], Relations::none());
        let err = registry.fetch(&request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingResolver);
    }

    #[tokio::test]
    async fn test_resolve_one() {
        let registry = Registry::new().with_resolver(
            "user",
            resolver_fn(|request: FetchRequest| async move {
                let mut list = EntityList::typed("user");
                if request.ids.contains(&Identifier::Int(1)) {
                    list.push(Entity::new(1, "user")?.into_shared())?;
                }
                Ok::<_, LoadError>(list)
            }),
        );

        let found = registry.resolve_one("user", 1, Relations::none(), None).await.unwrap();
        assert_eq!(found.map(|e| e.id().clone()), Some(Identifier::Int(1)));

        let missing = registry.resolve_one("user", 2, Relations::none(), None).await.unwrap();
        assert!(missing.is_none());

        let err = registry.require_one("user", 2, Relations::none(), None).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
