use super::definition::IndexDefinition;
use super::producer::{DocumentProducer, IdDocuments};
use crate::callbacks::RecordCallbacks;
use crate::client::{AliasInfo, Backend};
use crate::collection::{Collection, ImportFailure, DEFAULT_BATCH_SIZE};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming::{self, Version};
use crate::search::{QueryBy, Search};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a completed reindex
#[derive(Debug, Clone)]
pub struct ReindexOutcome {
    /// The collection the alias now points to
    pub collection: Collection,
    pub failures: Vec<ImportFailure>,
}

/// Versioned collections behind one alias.
///
/// The alias is only ever moved by [`Index::update_alias`]; building and
/// populating a new version never affects readers of the current one.
pub struct Index<P = IdDocuments> {
    backend: Backend,
    definition: Arc<IndexDefinition>,
    producer: Arc<P>,
    batch_size: usize,
}

impl<P> Clone for Index<P> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            definition: Arc::clone(&self.definition),
            producer: Arc::clone(&self.producer),
            batch_size: self.batch_size,
        }
    }
}

impl Index<IdDocuments> {
    /// An index whose documents are just `{"id": id}`
    pub fn with_ids(backend: Backend, definition: IndexDefinition) -> Self {
        Self::new(backend, definition, IdDocuments)
    }
}

impl<P: DocumentProducer> Index<P> {
    pub fn new(backend: Backend, definition: IndexDefinition, producer: P) -> Self {
        Self {
            backend,
            definition: Arc::new(definition),
            producer: Arc::new(producer),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Like [`Index::new`], taking the import batch size from configuration
    pub fn from_config(
        backend: Backend,
        config: &Config,
        definition: IndexDefinition,
        producer: P,
    ) -> Self {
        Self::new(backend, definition, producer).with_batch_size(config.batch_size)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn index_name(&self) -> &str {
        self.definition.index_name()
    }

    pub fn env(&self) -> Option<&str> {
        self.definition.env()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn alias_name(&self) -> String {
        self.definition.alias_name()
    }

    pub fn collection_name_for(&self, version: Version) -> String {
        self.definition.collection_name_for(version)
    }

    /// Create a new, empty version stamped with the current time
    pub async fn create(&self) -> Result<Collection> {
        self.create_at(Version::now()).await
    }

    /// Create a new, empty version; the alias is not touched.
    ///
    /// Fails with [`Error::NameConflict`] if the version already exists.
    pub async fn create_at(&self, version: Version) -> Result<Collection> {
        let name = self.collection_name_for(version);
        Collection::create_with(self.backend.clone(), &name, self.definition.schema()).await
    }

    /// The collection the alias points to, or `None` while unbound
    pub async fn collection(&self) -> Result<Option<Collection>> {
        let alias = match self.backend.retrieve_alias(&self.alias_name()).await {
            Ok(alias) => alias,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        self.open(&alias.collection_name).await
    }

    /// Every collection whose index name matches, oldest first
    pub async fn collections(&self) -> Result<Vec<Collection>> {
        let mut collections: Vec<Collection> = self
            .backend
            .retrieve_collections()
            .await?
            .into_iter()
            .filter(|metadata| naming::parse(&metadata.name).index_name == self.index_name())
            .map(|metadata| Collection::from_metadata(self.backend.clone(), metadata))
            .collect();

        collections.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(collections)
    }

    /// [`Index::collections`] restricted to this index's env
    pub async fn collections_in_env(&self) -> Result<Vec<Collection>> {
        let env = self.env().map(str::to_string);
        Ok(self
            .collections()
            .await?
            .into_iter()
            .filter(|collection| collection.env().map(str::to_string) == env)
            .collect())
    }

    /// The version `version` of this index in its env, if it exists
    pub async fn collection_for(&self, version: Version) -> Result<Option<Collection>> {
        self.open(&self.collection_name_for(version)).await
    }

    async fn open(&self, name: &str) -> Result<Option<Collection>> {
        match Collection::open(self.backend.clone(), name).await {
            Ok(collection) => Ok(Some(collection)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Atomically point the alias at `target` (a collection or its name)
    pub async fn update_alias(&self, target: impl AsRef<str>) -> Result<AliasInfo> {
        let alias = self
            .backend
            .upsert_alias(&self.alias_name(), target.as_ref())
            .await?;
        info!(alias = %alias.name, collection = %alias.collection_name, "Updated alias");
        Ok(alias)
    }

    /// Stream the documents for `ids` into `collection`
    pub async fn index_many<I>(&self, ids: I, collection: &Collection) -> Result<Vec<ImportFailure>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        info!(collection = %collection.name(), ids = ids.len(), "Indexing documents");
        collection
            .try_insert_many(self.producer.produce(ids), self.batch_size)
            .await
    }

    /// Build (or take) a collection, populate it, then flip the alias.
    ///
    /// If population fails the alias keeps its current target and the new
    /// collection is left in place.
    pub async fn reindex<I>(&self, ids: I, collection: Option<Collection>) -> Result<ReindexOutcome>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let collection = match collection {
            Some(collection) => collection,
            None => self.create().await?,
        };
        info!(alias = %self.alias_name(), collection = %collection.name(), "Reindexing");

        let failures = match self.index_many(ids, &collection).await {
            Ok(failures) => failures,
            Err(err) => {
                warn!(
                    alias = %self.alias_name(),
                    collection = %collection.name(),
                    error = %err,
                    "Reindex aborted, alias unchanged; collection left for inspection"
                );
                return Err(err);
            }
        };

        self.update_alias(&collection).await?;
        Ok(ReindexOutcome {
            collection,
            failures,
        })
    }

    /// Upsert the documents produced for one id.
    ///
    /// Without a collection the alias target is used; an unbound alias is
    /// [`Error::NotFound`].
    pub async fn index_one(&self, id: impl Into<String>, collection: Option<&Collection>) -> Result<()> {
        let target = self.target(collection);
        let mut documents = self.producer.produce(vec![id.into()]);
        while let Some(document) = documents.next().await {
            self.backend.upsert_document(&target, &document?).await?;
        }
        Ok(())
    }

    /// Delete one document by id from `collection` or the alias target
    pub async fn remove_one(&self, id: &str, collection: Option<&Collection>) -> Result<()> {
        self.backend
            .delete_document(&self.target(collection), id)
            .await
            .map(|_| ())
    }

    fn target(&self, collection: Option<&Collection>) -> String {
        collection
            .map(|collection| collection.name().to_string())
            .unwrap_or_else(|| self.alias_name())
    }

    /// Query the aliased collection
    pub fn search(&self, query: impl Into<String>, query_by: impl Into<QueryBy>) -> Search {
        Search::new(self.backend.clone(), self.alias_name(), query, query_by)
    }

    /// Adapter for record lifecycle hooks
    pub fn callbacks(&self) -> RecordCallbacks<P> {
        RecordCallbacks::new(self.clone())
    }
}

impl<P> std::fmt::Debug for Index<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("definition", &self.definition)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::create_in_memory_backend;
    use crate::index::MapDocuments;
    use crate::schema::Field;
    use serde_json::json;

    fn definition(env: Option<&str>) -> IndexDefinition {
        IndexDefinition::builder("posts")
            .field(Field::new("title", "string"))
            .env(env)
            .build()
    }

    fn version(seconds: &str) -> Version {
        Version::parse(seconds).unwrap()
    }

    fn titled() -> MapDocuments<impl Fn(String) -> Result<serde_json::Value> + Send + Sync + 'static> {
        MapDocuments::new(|id: String| Ok(json!({"id": id, "title": format!("post {}", id)})))
    }

    #[tokio::test]
    async fn test_unbound_alias() {
        let index = Index::with_ids(create_in_memory_backend(), definition(None));
        assert!(index.collection().await.unwrap().is_none());

        let err = index.index_one("1", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_same_version_conflicts() {
        let index = Index::with_ids(create_in_memory_backend(), definition(Some("test")));
        let collection = index.create_at(version("1700000000")).await.unwrap();
        assert_eq!(collection.name(), "posts:test@1700000000");

        let err = index.create_at(version("1700000000")).await.unwrap_err();
        assert!(err.is_name_conflict());
        assert!(index.collection().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reindex_flips_alias() {
        let index = Index::new(create_in_memory_backend(), definition(None), titled());

        let first = index.reindex(["1", "2"], None).await.unwrap();
        assert!(first.failures.is_empty());
        let live = index.collection().await.unwrap().unwrap();
        assert_eq!(live.name(), first.collection.name());
        assert_eq!(live.num_documents(), 2);

        let next = index.create_at(version("4102444800")).await.unwrap();
        index.reindex(["1"], Some(next)).await.unwrap();

        let collections = index.collections().await.unwrap();
        assert_eq!(collections.len(), 2);
        let live = index.collection().await.unwrap().unwrap();
        assert_eq!(live.version(), Some(version("4102444800")));
    }

    #[tokio::test]
    async fn test_single_document_operations_use_alias() {
        let index = Index::new(create_in_memory_backend(), definition(None), titled());
        index.reindex(Vec::<String>::new(), None).await.unwrap();

        index.index_one("9", None).await.unwrap();
        let live = index.collection().await.unwrap().unwrap();
        assert_eq!(live.num_documents(), 1);

        index.remove_one("9", None).await.unwrap();
        let live = index.collection().await.unwrap().unwrap();
        assert_eq!(live.num_documents(), 0);
    }

    #[tokio::test]
    async fn test_collections_filter_by_index_and_env() {
        let backend = create_in_memory_backend();
        let staging = Index::with_ids(backend.clone(), definition(Some("staging")));
        let production = Index::with_ids(backend.clone(), definition(Some("production")));
        let other = Index::with_ids(
            backend.clone(),
            IndexDefinition::builder("users").build(),
        );

        staging.create_at(version("1")).await.unwrap();
        production.create_at(version("2")).await.unwrap();
        other.create_at(version("3")).await.unwrap();

        assert_eq!(staging.collections().await.unwrap().len(), 2);
        let in_env = staging.collections_in_env().await.unwrap();
        assert_eq!(in_env.len(), 1);
        assert_eq!(in_env[0].env(), Some("staging"));

        assert!(staging.collection_for(version("1")).await.unwrap().is_some());
        assert!(staging.collection_for(version("2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_alias_by_name() {
        let index = Index::with_ids(create_in_memory_backend(), definition(None));
        let collection = index.create_at(version("10")).await.unwrap();

        let alias = index.update_alias(collection.name()).await.unwrap();
        assert_eq!(alias.name, "posts");
        assert_eq!(alias.collection_name, "posts@10");

        let err = index.update_alias("posts@11").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
