//! Versioned search indexes over a Typesense-compatible service.
//!
//! A logical index is exposed through an alias (`index[:env]`). Rebuilding it
//! creates a new collection stamped with a version (`index[:env]@<seconds>`),
//! streams documents into it in batches and then repoints the alias in one
//! atomic step, so readers never see a half-built index.
//!
//! ```no_run
//! use versioned_search::{client, Config, Field, Index, IndexDefinition};
//!
//! # async fn run() -> versioned_search::Result<()> {
//! let config = Config::load()?;
//! let backend = client::create_backend(&config)?;
//!
//! let definition = IndexDefinition::builder("posts")
//!     .field(Field::new("title", "string"))
//!     .env_from(&config)
//!     .build();
//! let posts = Index::with_ids(backend, definition);
//!
//! posts.reindex(["1", "2", "3"], None).await?;
//! let results = posts.search("rust", "title").per(10).load().await?;
//! println!("{} matches", results.count());
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod callbacks;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod index;
pub mod naming;
pub mod schema;
pub mod search;
pub mod telemetry;

pub use callbacks::RecordCallbacks;
pub use client::{Backend, SearchBackend};
pub use collection::{Collection, ImportFailure};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use index::{Catalog, DocumentProducer, IdDocuments, Index, IndexDefinition, ReindexOutcome};
pub use naming::{CollectionName, Version};
pub use schema::{Field, FieldName, Schema};
pub use search::{QueryBy, Results, Search, SortDirection};
