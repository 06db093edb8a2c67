//! Access to the remote search service.
//!
//! Everything above this module talks to the service through the
//! [`SearchBackend`] trait. [`HttpBackend`] speaks the REST protocol over
//! reqwest; [`InMemoryBackend`] keeps collections, documents and aliases in
//! process for tests and local development.

mod http;
mod memory;
mod traits;
mod types;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;
pub use traits::{SearchBackend, SearchParams};
pub use types::{AliasInfo, CollectionMetadata, ImportOutcome};

use crate::config::{BackendKind, Config};
use crate::error::Result;
use std::sync::Arc;

/// Shared handle used by collections, indexes and searches
pub type Backend = Arc<dyn SearchBackend>;

/// Create a backend based on configuration
pub fn create_backend(config: &Config) -> Result<Backend> {
    config.validate()?;

    match config.backend {
        BackendKind::Http => {
            let backend = HttpBackend::new(config)?;
            tracing::info!(node = %backend.base_url(), "Initializing HTTP search backend");
            Ok(Arc::new(backend))
        }
        BackendKind::InMemory => Ok(create_in_memory_backend()),
    }
}

/// Create an in-memory backend (for testing and development)
pub fn create_in_memory_backend() -> Backend {
    tracing::info!("Initializing in-memory search backend");
    Arc::new(InMemoryBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[test]
    fn test_create_http_backend() {
        let config = ConfigBuilder::new().api_key("xyz").build();
        assert!(create_backend(&config).is_ok());
    }

    #[test]
    fn test_create_backend_rejects_invalid_config() {
        let config = ConfigBuilder::new().batch_size(0).build();
        assert!(create_backend(&config).is_err());
    }

    #[tokio::test]
    async fn test_create_in_memory_backend() {
        let config = ConfigBuilder::new().backend(BackendKind::InMemory).build();
        let backend = create_backend(&config).unwrap();
        assert!(backend.retrieve_collections().await.unwrap().is_empty());
    }
}
