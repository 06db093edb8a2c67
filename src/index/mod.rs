//! Logical indexes: a stable alias in front of timestamp-versioned
//! collections, rebuilt by creating a new version, populating it and flipping
//! the alias.

mod catalog;
mod controller;
mod definition;
mod producer;

pub use catalog::Catalog;
pub use controller::{Index, ReindexOutcome};
pub use definition::{infer_index_name, IndexDefinition, IndexDefinitionBuilder};
pub use producer::{DocumentProducer, IdDocuments, MapDocuments};
