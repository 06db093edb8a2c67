//! Document shape of one index: field definitions plus collection-level options

mod field;
#[allow(clippy::module_inception)]
mod schema;

pub use field::{Field, FieldName};
pub use schema::{Schema, SchemaBuilder};
