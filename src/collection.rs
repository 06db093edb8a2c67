//! A view over one concrete, versioned collection on the search service.

use crate::client::{Backend, CollectionMetadata};
use crate::error::{Error, Result};
use crate::naming::{self, CollectionName, Version};
use crate::schema::{Field, Schema};
use crate::search::{QueryBy, Search};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

/// Default number of documents per import request
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A row the service refused during a bulk import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFailure {
    /// Zero-based position of the row in the input sequence
    pub position: usize,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

/// Concrete collection plus its metadata snapshot
#[derive(Clone)]
pub struct Collection {
    backend: Backend,
    metadata: CollectionMetadata,
    parsed: CollectionName,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.metadata.name)
            .field("num_documents", &self.metadata.num_documents)
            .finish()
    }
}

impl AsRef<str> for Collection {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

impl Collection {
    /// Fetch a collection by name (aliases resolve to their target)
    pub async fn open(backend: Backend, name: &str) -> Result<Self> {
        let metadata = backend.retrieve_collection(name).await?;
        Ok(Self::from_metadata(backend, metadata))
    }

    /// Wrap metadata that has already been fetched
    pub fn from_metadata(backend: Backend, metadata: CollectionMetadata) -> Self {
        let parsed = naming::parse(&metadata.name);
        Self {
            backend,
            metadata,
            parsed,
        }
    }

    /// Create a collection named `name` from `schema`.
    ///
    /// Fails with [`Error::NameConflict`] when the name is taken.
    pub async fn create_with(backend: Backend, name: &str, schema: &Schema) -> Result<Self> {
        let metadata = backend
            .create_collection(&schema.to_wire_named(name))
            .await?;
        info!(collection = %metadata.name, fields = metadata.fields.len(), "Created collection");
        Ok(Self::from_metadata(backend, metadata))
    }

    /// Re-fetch metadata; identity is unchanged
    pub async fn reload(&mut self) -> Result<()> {
        self.metadata = self.backend.retrieve_collection(&self.metadata.name).await?;
        Ok(())
    }

    /// Drop the remote collection and its documents
    pub async fn delete(self) -> Result<()> {
        self.backend.delete_collection(&self.metadata.name).await?;
        info!(collection = %self.metadata.name, "Deleted collection");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.metadata.created_at, 0).unwrap_or_default()
    }

    pub fn default_sorting_field(&self) -> Option<&str> {
        self.metadata
            .default_sorting_field
            .as_deref()
            .filter(|field| !field.is_empty())
    }

    pub fn enable_nested_fields(&self) -> bool {
        self.metadata.enable_nested_fields
    }

    pub fn fields(&self) -> &[Field] {
        &self.metadata.fields
    }

    /// Document count as of the last fetch
    pub fn num_documents(&self) -> u64 {
        self.metadata.num_documents
    }

    pub fn symbols_to_index(&self) -> &[String] {
        &self.metadata.symbols_to_index
    }

    pub fn token_separators(&self) -> &[String] {
        &self.metadata.token_separators
    }

    pub fn index_name(&self) -> &str {
        &self.parsed.index_name
    }

    pub fn env(&self) -> Option<&str> {
        self.parsed.env.as_deref()
    }

    pub fn version(&self) -> Option<Version> {
        self.parsed.version
    }

    pub fn metadata(&self) -> &CollectionMetadata {
        &self.metadata
    }

    pub(crate) fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Rebuild a schema from the live metadata
    pub fn schema(&self) -> Schema {
        let mut builder = Schema::builder().add_fields(self.metadata.fields.iter().cloned());
        if !self.metadata.token_separators.is_empty() {
            builder = builder.token_separators(self.metadata.token_separators.iter().cloned());
        }
        if !self.metadata.symbols_to_index.is_empty() {
            builder = builder.symbols_to_index(self.metadata.symbols_to_index.iter().cloned());
        }
        if let Some(field) = self.default_sorting_field() {
            builder = builder.default_sorting_field(field);
        }
        if self.metadata.enable_nested_fields {
            builder = builder.enable_nested_fields(true);
        }
        builder.build()
    }

    /// Upsert one document by id
    pub async fn insert_one(&self, document: &Value) -> Result<Value> {
        self.backend.upsert_document(self.name(), document).await
    }

    /// Stream documents into the collection in sequential batches.
    ///
    /// Rows the service rejects are returned; transport errors abort.
    pub async fn insert_many<S>(&self, documents: S, batch_size: usize) -> Result<Vec<ImportFailure>>
    where
        S: Stream<Item = Value>,
    {
        self.try_insert_many(documents.map(Ok), batch_size).await
    }

    pub async fn insert_many_iter<I>(
        &self,
        documents: I,
        batch_size: usize,
    ) -> Result<Vec<ImportFailure>>
    where
        I: IntoIterator<Item = Value>,
    {
        self.insert_many(stream::iter(documents), batch_size).await
    }

    /// Like [`Collection::insert_many`], for producers that can fail.
    ///
    /// The first producer error stops population and is returned; batches
    /// already imported stay imported.
    pub async fn try_insert_many<S>(
        &self,
        documents: S,
        batch_size: usize,
    ) -> Result<Vec<ImportFailure>>
    where
        S: Stream<Item = Result<Value>>,
    {
        if batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch_size must be greater than zero".to_string(),
            ));
        }

        let mut documents = Box::pin(documents);
        let mut batch = Vec::with_capacity(batch_size);
        let mut import = BulkImport::default();

        while let Some(document) = documents.next().await {
            batch.push(document?);
            if batch.len() == batch_size {
                self.import_batch(&mut batch, &mut import).await?;
            }
        }
        if !batch.is_empty() {
            self.import_batch(&mut batch, &mut import).await?;
        }

        if import.failures.is_empty() {
            info!(
                collection = %self.name(),
                documents = import.position,
                batches = import.batches,
                "Bulk import finished"
            );
        } else {
            warn!(
                collection = %self.name(),
                documents = import.position,
                batches = import.batches,
                failures = import.failures.len(),
                "Bulk import finished with rejected documents"
            );
        }

        Ok(import.failures)
    }

    async fn import_batch(&self, batch: &mut Vec<Value>, import: &mut BulkImport) -> Result<()> {
        let outcomes = self.backend.import_documents(self.name(), batch).await?;
        if outcomes.len() != batch.len() {
            return Err(Error::Transport(format!(
                "import into {} answered {} outcomes for {} documents",
                self.name(),
                outcomes.len(),
                batch.len()
            )));
        }

        let before = import.failures.len();
        for (offset, outcome) in outcomes.into_iter().enumerate() {
            if !outcome.success {
                import.failures.push(ImportFailure {
                    position: import.position + offset,
                    error: outcome.error.unwrap_or_default(),
                    document: outcome.document,
                    code: outcome.code,
                });
            }
        }

        debug!(
            collection = %self.name(),
            batch = import.batches,
            size = batch.len(),
            failures = import.failures.len() - before,
            "Imported batch"
        );

        import.position += batch.len();
        import.batches += 1;
        batch.clear();
        Ok(())
    }

    /// Delete one document by id
    pub async fn remove_one(&self, id: &str) -> Result<Value> {
        self.backend.delete_document(self.name(), id).await
    }

    /// Delete every document matching `filter_by`; returns the count
    pub async fn remove_many(&self, filter_by: &str) -> Result<u64> {
        self.backend.delete_documents(self.name(), filter_by).await
    }

    /// Start a query against this collection
    pub fn search(&self, query: impl Into<String>, query_by: impl Into<QueryBy>) -> Search {
        Search::new(self.backend.clone(), self.name(), query, query_by)
    }
}

#[derive(Default)]
struct BulkImport {
    position: usize,
    batches: usize,
    failures: Vec<ImportFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::create_in_memory_backend;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::builder()
            .add_field(Field::new("title", "string"))
            .add_field(Field::new("year", "int32").optional(true))
            .token_separators(["-"])
            .build()
    }

    #[tokio::test]
    async fn test_open_missing_collection() {
        let backend = create_in_memory_backend();
        let err = Collection::open(backend, "posts@1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_parses_name() {
        let backend = create_in_memory_backend();
        let collection = Collection::create_with(backend, "posts:staging@1700000000", &schema())
            .await
            .unwrap();

        assert_eq!(collection.index_name(), "posts");
        assert_eq!(collection.env(), Some("staging"));
        assert_eq!(collection.version(), Version::parse("1700000000"));
        assert_eq!(collection.token_separators(), &["-".to_string()]);
        assert_eq!(collection.schema().fields().len(), 2);
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let backend = create_in_memory_backend();
        Collection::create_with(backend.clone(), "posts@1", &schema())
            .await
            .unwrap();
        let err = Collection::create_with(backend, "posts@1", &schema())
            .await
            .unwrap_err();
        assert!(err.is_name_conflict());
    }

    #[tokio::test]
    async fn test_insert_one_rejected_document() {
        let backend = create_in_memory_backend();
        let collection = Collection::create_with(backend, "posts@1", &schema())
            .await
            .unwrap();

        let err = collection
            .insert_one(&json!({"id": "1", "year": 2020}))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_insert_many_reports_positions() {
        let backend = create_in_memory_backend();
        let mut collection = Collection::create_with(backend, "posts@1", &schema())
            .await
            .unwrap();

        let documents = vec![
            json!({"id": "1", "title": "a"}),
            json!({"id": "2"}),
            json!({"id": "3", "title": "c"}),
            json!({"id": "4", "title": 4}),
            json!({"id": "5", "title": "e"}),
        ];

        let failures = collection.insert_many_iter(documents, 2).await.unwrap();
        assert_eq!(
            failures.iter().map(|f| f.position).collect::<Vec<_>>(),
            vec![1, 3]
        );

        collection.reload().await.unwrap();
        assert_eq!(collection.num_documents(), 3);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let backend = create_in_memory_backend();
        let collection = Collection::create_with(backend, "posts@1", &schema())
            .await
            .unwrap();

        let err = collection.insert_many_iter(Vec::new(), 0).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_producer_error_stops_population() {
        let backend = create_in_memory_backend();
        let mut collection = Collection::create_with(backend, "posts@1", &schema())
            .await
            .unwrap();

        let documents = stream::iter(vec![
            Ok(json!({"id": "1", "title": "a"})),
            Err(Error::Transport("database went away".to_string())),
            Ok(json!({"id": "2", "title": "b"})),
        ]);

        assert!(collection.try_insert_many(documents, 1).await.is_err());
        collection.reload().await.unwrap();
        assert_eq!(collection.num_documents(), 1);
    }

    #[tokio::test]
    async fn test_insert_many_imports_each_batch_before_reading_on() {
        use crate::client::InMemoryBackend;
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let memory = Arc::new(InMemoryBackend::new());
        let backend: Backend = memory.clone();
        let collection = Collection::create_with(backend, "posts@1", &schema())
            .await
            .unwrap();
        let before = memory.request_count();

        let observed = Arc::new(AtomicU64::new(0));
        let documents = {
            let memory = memory.clone();
            let observed = observed.clone();
            stream::iter(1..=5).map(move |i| {
                if i == 3 {
                    observed.store(memory.request_count(), Ordering::SeqCst);
                }
                json!({"id": i.to_string(), "title": "t"})
            })
        };

        let failures = collection.insert_many(documents, 2).await.unwrap();
        assert!(failures.is_empty());
        assert_eq!(observed.load(Ordering::SeqCst), before + 1);
        assert_eq!(memory.request_count(), before + 3);
    }

    #[tokio::test]
    async fn test_producer_error_keeps_full_batches() {
        let backend = create_in_memory_backend();
        let mut collection = Collection::create_with(backend, "posts@1", &schema())
            .await
            .unwrap();

        let documents = stream::iter(vec![
            Ok(json!({"id": "1", "title": "a"})),
            Ok(json!({"id": "2", "title": "b"})),
            Ok(json!({"id": "3", "title": "c"})),
            Ok(json!({"id": "4", "title": "d"})),
            Err(Error::Transport("database went away".to_string())),
            Ok(json!({"id": "5", "title": "e"})),
        ]);

        assert!(collection.try_insert_many(documents, 3).await.is_err());
        collection.reload().await.unwrap();
        assert_eq!(collection.num_documents(), 3);
    }

    #[tokio::test]
    async fn test_remove_many() {
        let backend = create_in_memory_backend();
        let collection = Collection::create_with(backend, "posts@1", &schema())
            .await
            .unwrap();
        collection
            .insert_many_iter(
                vec![
                    json!({"id": "1", "title": "a", "year": 2001}),
                    json!({"id": "2", "title": "b", "year": 2002}),
                ],
                DEFAULT_BATCH_SIZE,
            )
            .await
            .unwrap();

        assert_eq!(collection.remove_many("year:=2001").await.unwrap(), 1);
        collection.remove_one("2").await.unwrap();
        assert!(collection.remove_one("2").await.unwrap_err().is_not_found());
    }
}
