//! Relation resolution.
//!
//! This module turns a requested set of relation paths into batched
//! fetches:
//! - [`Relations`] parses and scopes relation paths
//! - [`GraphWalker`] collects the references a graph needs into a [`LoadPlan`]
//! - [`Loader`] fetches, caches and splices results back into the graph
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut loader = Loader::new(registry);
//! let mut article = loader.ingest(&json)?;
//!
//! // One call for the author, one for all categories
//! loader.load(&mut article, "author.profile,categories").await?;
//!
//! // Everything two levels deep
//! loader.load(&mut article, 2u32).await?;
//! ```

mod loader;
mod path;
mod plan;
mod walker;

pub use loader::{LoadReport, Loader};
pub use path::{IntoRelations, Relations};
pub use plan::{LoadPlan, PlanEntry};
pub use walker::GraphWalker;
