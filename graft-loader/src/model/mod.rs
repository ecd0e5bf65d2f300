//! Graph data model.
//!
//! A graph is built from [`Value`]s. Nodes with identity are either an
//! [`Entity`] (resolved, shared through `Arc`) or a [`Reference`]
//! (unresolved `(type, id)` pair). [`ingest`] classifies raw JSON once so
//! the rest of the crate never has to guess.

mod entity;
mod ingest;
mod value;

pub use entity::{Entity, EntityList, ID_FIELD, Identifier, Reference, TYPE_FIELD};
pub use ingest::{ingest, ingest_entity, ingest_list};
pub use value::{Scalar, Value};

pub(crate) use ingest::{identity, reassemble};
