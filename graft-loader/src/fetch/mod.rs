//! The fetcher interface.
//!
//! A [`Fetcher`] resolves a batch of ids of one type into entities. It is
//! the only place the loader awaits. [`Registry`] is a table-driven
//! implementation dispatching each type to its own [`Resolver`].

mod registry;

pub use registry::{FallbackFn, Registry, Resolver, ResolverFn, DEFAULT_MAPPING, resolver_fn};

use async_trait::async_trait;
use smol_str::SmolStr;
use std::sync::Arc;

use crate::error::LoadResult;
use crate::model::{EntityList, Identifier};
use crate::relations::Relations;

/// A request for one batch of entities of a single type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Entity type.
    pub type_name: SmolStr,
    /// Ids to fetch, in discovery order, without duplicates.
    pub ids: Vec<Identifier>,
    /// Relations to resolve below each entity.
    pub relations: Relations,
    /// Locale forwarded from the loader configuration.
    pub locale: Option<String>,
}

impl FetchRequest {
    /// Create a request without a locale.
    pub fn new(type_name: impl Into<SmolStr>, ids: Vec<Identifier>, relations: Relations) -> Self {
        Self {
            type_name: type_name.into(),
            ids,
            relations,
            locale: None,
        }
    }

    /// Set the locale.
    pub fn with_locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    /// Whether this is the single-id form.
    pub fn is_single(&self) -> bool {
        self.ids.len() == 1
    }

    /// The id of a single-id request.
    pub fn single_id(&self) -> Option<&Identifier> {
        match self.ids.as_slice() {
            [id] => Some(id),
            _ => None,
        }
    }

    /// Query parameters describing this request: `{"id": x}` for a single
    /// id, `{"id": {"in": [..]}}` otherwise.
    pub fn to_params(&self) -> serde_json::Value {
        let id = match self.single_id() {
            Some(id) => id.to_json(),
            None => serde_json::json!({
                "in": self.ids.iter().map(Identifier::to_json).collect::<Vec<_>>()
            }),
        };
        serde_json::json!({ "id": id })
    }
}

/// Resolves batches of references into entities.
///
/// Implementations return whatever subset of the requested ids they could
/// find; ids absent from the result stay unresolved. Any error aborts the
/// whole load.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the entities named by `request`.
    async fn fetch(&self, request: &FetchRequest) -> LoadResult<EntityList>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, request: &FetchRequest) -> LoadResult<EntityList> {
        (**self).fetch(request).await
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    async fn fetch(&self, request: &FetchRequest) -> LoadResult<EntityList> {
        (**self).fetch(request).await
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for &F {
    async fn fetch(&self, request: &FetchRequest) -> LoadResult<EntityList> {
        (**self).fetch(request).await
    }
}
