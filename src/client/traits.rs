use crate::client::types::{AliasInfo, CollectionMetadata, ImportOutcome};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat, string-valued search parameters as sent on the wire
pub type SearchParams = BTreeMap<String, String>;

/// Operations consumed from the remote search service.
///
/// Every call is a single request; implementations must not retry.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Create a collection from a full schema body (including `name`)
    async fn create_collection(&self, schema: &Value) -> Result<CollectionMetadata>;

    /// Retrieve one collection; alias names resolve to their target
    async fn retrieve_collection(&self, name: &str) -> Result<CollectionMetadata>;

    /// Retrieve every collection
    async fn retrieve_collections(&self) -> Result<Vec<CollectionMetadata>>;

    /// Drop a collection and its documents
    async fn delete_collection(&self, name: &str) -> Result<CollectionMetadata>;

    /// Insert or replace a document by id
    async fn upsert_document(&self, collection: &str, document: &Value) -> Result<Value>;

    /// Delete one document by id
    async fn delete_document(&self, collection: &str, id: &str) -> Result<Value>;

    /// Delete every document matching a filter expression; returns the count
    async fn delete_documents(&self, collection: &str, filter_by: &str) -> Result<u64>;

    /// Upsert a batch, reporting success or failure per row in input order
    async fn import_documents(
        &self,
        collection: &str,
        documents: &[Value],
    ) -> Result<Vec<ImportOutcome>>;

    /// Retrieve an alias
    async fn retrieve_alias(&self, name: &str) -> Result<AliasInfo>;

    /// Retrieve every alias
    async fn retrieve_aliases(&self) -> Result<Vec<AliasInfo>>;

    /// Create or atomically repoint an alias
    async fn upsert_alias(&self, name: &str, collection_name: &str) -> Result<AliasInfo>;

    /// Delete an alias
    async fn delete_alias(&self, name: &str) -> Result<AliasInfo>;

    /// Run one search against a collection (or alias)
    async fn search(&self, collection: &str, params: &SearchParams) -> Result<Value>;

    /// Run several searches in one request; each entry carries its `collection`
    async fn multi_search(&self, searches: &[SearchParams]) -> Result<Vec<Value>>;
}
