use crate::client::Backend;
use crate::collection::Collection;
use crate::error::Result;
use std::collections::BTreeMap;

/// Everything on the service, regardless of index
#[derive(Clone)]
pub struct Catalog {
    backend: Backend,
}

impl Catalog {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn collections(&self) -> Result<Vec<Collection>> {
        Ok(self
            .backend
            .retrieve_collections()
            .await?
            .into_iter()
            .map(|metadata| Collection::from_metadata(self.backend.clone(), metadata))
            .collect())
    }

    /// Alias name to collection name
    pub async fn aliases(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .backend
            .retrieve_aliases()
            .await?
            .into_iter()
            .map(|alias| (alias.name, alias.collection_name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::create_in_memory_backend;
    use crate::schema::Schema;

    #[tokio::test]
    async fn test_lists_everything() {
        let backend = create_in_memory_backend();
        for name in ["posts@1", "users:staging@2", "scratch"] {
            Collection::create_with(backend.clone(), name, &Schema::default())
                .await
                .unwrap();
        }
        backend.upsert_alias("posts", "posts@1").await.unwrap();

        let catalog = Catalog::new(backend);
        let collections = catalog.collections().await.unwrap();
        assert_eq!(collections.len(), 3);
        assert!(collections.iter().any(|c| c.index_name() == "users" && c.env() == Some("staging")));

        let aliases = catalog.aliases().await.unwrap();
        assert_eq!(aliases.get("posts").map(String::as_str), Some("posts@1"));
    }
}
