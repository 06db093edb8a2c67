//! Record lifecycle hooks.
//!
//! Wire these into whatever owns the records (an ORM hook, a change feed
//! consumer) to keep the live collection in step between full reindexes.

use crate::error::Result;
use crate::index::{DocumentProducer, Index};
use tracing::debug;

pub struct RecordCallbacks<P> {
    index: Index<P>,
}

impl<P: DocumentProducer> RecordCallbacks<P> {
    pub fn new(index: Index<P>) -> Self {
        Self { index }
    }

    pub async fn after_create(&self, id: &str) -> Result<()> {
        debug!(alias = %self.index.alias_name(), id, "Record created");
        self.index.index_one(id, None).await
    }

    pub async fn after_update(&self, id: &str) -> Result<()> {
        debug!(alias = %self.index.alias_name(), id, "Record updated");
        self.index.index_one(id, None).await
    }

    /// Reindex the record only when `predicate` holds
    pub async fn after_update_if<F>(&self, id: &str, predicate: F) -> Result<bool>
    where
        F: FnOnce() -> bool,
    {
        if !predicate() {
            return Ok(false);
        }
        self.after_update(id).await?;
        Ok(true)
    }

    pub async fn after_delete(&self, id: &str) -> Result<()> {
        debug!(alias = %self.index.alias_name(), id, "Record deleted");
        self.index.remove_one(id, None).await
    }
}

impl<P> Clone for RecordCallbacks<P> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::create_in_memory_backend;
    use crate::index::IndexDefinition;

    async fn live_count(index: &Index) -> u64 {
        index
            .collection()
            .await
            .unwrap()
            .map(|collection| collection.num_documents())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let index = Index::with_ids(
            create_in_memory_backend(),
            IndexDefinition::builder("posts").build(),
        );
        index.reindex(Vec::<String>::new(), None).await.unwrap();
        let callbacks = index.callbacks();

        callbacks.after_create("1").await.unwrap();
        callbacks.after_update("2").await.unwrap();
        assert_eq!(live_count(&index).await, 2);

        assert!(!callbacks.after_update_if("3", || false).await.unwrap());
        assert_eq!(live_count(&index).await, 2);
        assert!(callbacks.after_update_if("3", || true).await.unwrap());
        assert_eq!(live_count(&index).await, 3);

        callbacks.after_delete("1").await.unwrap();
        assert_eq!(live_count(&index).await, 2);
    }

    #[tokio::test]
    async fn test_unbound_index_reports_not_found() {
        let index = Index::with_ids(
            create_in_memory_backend(),
            IndexDefinition::builder("posts").build(),
        );
        let err = index.callbacks().after_create("1").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
