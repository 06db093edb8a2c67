//! Query compilation and search results.
//!
//! [`Search`] accumulates filters, sorts, facets and free-form parameters and
//! compiles them into the flat string parameters the service expects.

pub mod facet;
mod multi;
mod query;
mod results;

pub use facet::{FacetOptions, FacetRange, FacetSort, FacetSpec};
pub use multi::{multi, multi_named};
pub use query::{QueryBy, Search, SortDirection};
pub use results::{Facet, GroupedHit, Hit, Results};
