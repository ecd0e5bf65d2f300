//! # Graft
//!
//! Batched relation loading and per-request entity caching for graph APIs.
//!
//! Graft provides:
//! - A request-scoped store that deduplicates entities by type and id
//! - A relation path language for asking which parts of a graph to resolve
//! - A loader issuing one batched fetch per entity type and relation scope
//! - Nested and flat (`data` + `included`) JSON rendering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graft::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), graft::LoadError> {
//!     let registry = Registry::new().with_resolver(
//!         "user",
//!         resolver_fn(|request: FetchRequest| async move { users_by_id(&request.ids).await }),
//!     );
//!
//!     let mut loader = Loader::new(registry);
//!     let mut article = loader.ingest(&payload)?;
//!     loader.load(&mut article, "author").await?;
//!
//!     println!("{}", loader.serializer().to_nested(&article));
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use graft_loader::*;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use graft_loader::prelude::*;
}
