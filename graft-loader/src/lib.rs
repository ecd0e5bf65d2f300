//! # graft-loader
//!
//! Relation resolution and request-scoped caching for entity-graph APIs.
//!
//! This crate provides:
//! - An entity graph model (`Entity`, `Reference`, `EntityList`, `Value`)
//! - A request-scoped [`Store`] with a negative cache for missing records
//! - A relation path language (`"author.profile,categories"`)
//! - A [`Loader`] that resolves relations with one batched fetch per type
//! - A [`Serializer`] producing nested or flat (`data` + `included`) JSON
//!
//! ## Ingesting data
//!
//! ```rust
//! use graft_loader::{Store, ingest};
//! use serde_json::json;
//!
//! let mut store = Store::new();
//! let article = ingest(
//!     &json!({"id": 10, "type": "article", "title": "Hi", "author": {"id": 15, "type": "user"}}),
//!     &mut store,
//! )
//! .unwrap();
//!
//! let entity = article.as_entity().unwrap();
//! assert_eq!(entity.type_name(), "article");
//! assert!(entity.get("author").unwrap().is_reference());
//! ```
//!
//! ## Relation paths
//!
//! ```rust
//! use graft_loader::Relations;
//!
//! let relations = Relations::parse("author.profile,categories").unwrap();
//! assert!(relations.matches("author"));
//! assert!(relations.nested("author").unwrap().matches("profile"));
//! assert!(!relations.matches("comments"));
//! ```
//!
//! ## Loading
//!
//! ```rust,ignore
//! use graft_loader::{Loader, Registry, resolver_fn};
//!
//! let registry = Registry::new()
//!     .with_resolver("user", resolver_fn(|request| async move { fetch_users(request).await }));
//!
//! let mut loader = Loader::new(registry).with_batch_size(100);
//! let mut article = loader.ingest(&payload)?;
//! loader.load(&mut article, "author,categories").await?;
//!
//! let document = loader.serializer().to_flat(&article);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod relations;
pub mod serialize;
pub mod store;

pub use config::{EnvSource, LoaderConfig, MapEnvSource, StdEnvSource};
pub use error::{ErrorCode, LoadError, LoadResult};
pub use fetch::{FetchRequest, Fetcher, Registry, Resolver, ResolverFn, resolver_fn};
pub use model::{Entity, EntityList, Identifier, Reference, Scalar, Value, ingest, ingest_entity, ingest_list};
pub use relations::{GraphWalker, IntoRelations, LoadPlan, LoadReport, Loader, PlanEntry, Relations};
pub use serialize::{Envelope, FlatDocument, IncludedEntry, Serializer};
pub use store::{QueryKey, Store, StoreKey, StoreStats};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::LoaderConfig;
    pub use crate::error::{LoadError, LoadResult};
    pub use crate::fetch::{FetchRequest, Fetcher, Registry, resolver_fn};
    pub use crate::model::{Entity, EntityList, Identifier, Reference, Value};
    pub use crate::relations::{IntoRelations, Loader, Relations};
    pub use crate::serialize::{FlatDocument, Serializer};
    pub use crate::store::{Store, StoreKey};
}
