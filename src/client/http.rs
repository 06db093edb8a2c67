use crate::client::traits::{SearchBackend, SearchParams};
use crate::client::types::{AliasInfo, CollectionMetadata, ImportOutcome};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";
const USER_AGENT: &str = concat!("versioned-search/", env!("CARGO_PKG_VERSION"));

/// REST transport to a Typesense-compatible service
#[derive(Clone)]
pub struct HttpBackend {
    pub(crate) client: Client,
    base_url: Url,
    api_key: Option<String>,
    pub(crate) timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct AliasList {
    #[serde(default)]
    aliases: Vec<AliasInfo>,
}

#[derive(Debug, Deserialize)]
struct DeleteByFilter {
    #[serde(default)]
    num_deleted: u64,
}

#[derive(Debug, Deserialize)]
struct MultiSearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

impl HttpBackend {
    /// Create a backend talking to the first configured node
    pub fn new(config: &Config) -> Result<Self> {
        let node = config.nodes.first().ok_or_else(|| {
            Error::Configuration("at least one node is required for the http backend".to_string())
        })?;

        Self::with_base_url(&node.url(), config.api_key.clone(), config.timeout_secs)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Configuration(format!("invalid node url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "node url {} cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::Configuration(format!("node url {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header("User-Agent", USER_AGENT);

        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// Send and return the body of a 2xx response
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = status.as_u16(), body = %body, "Search service returned an error");
            return Err(Error::from_status(status, &body));
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn create_collection(&self, schema: &Value) -> Result<CollectionMetadata> {
        let url = self.endpoint(&["collections"])?;
        self.send_json(self.request(Method::POST, url).json(schema))
            .await
    }

    async fn retrieve_collection(&self, name: &str) -> Result<CollectionMetadata> {
        let url = self.endpoint(&["collections", name])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn retrieve_collections(&self) -> Result<Vec<CollectionMetadata>> {
        let url = self.endpoint(&["collections"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn delete_collection(&self, name: &str) -> Result<CollectionMetadata> {
        let url = self.endpoint(&["collections", name])?;
        self.send_json(self.request(Method::DELETE, url)).await
    }

    async fn upsert_document(&self, collection: &str, document: &Value) -> Result<Value> {
        let url = self.endpoint(&["collections", collection, "documents"])?;
        self.send_json(
            self.request(Method::POST, url)
                .query(&[("action", "upsert")])
                .json(document),
        )
        .await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<Value> {
        let url = self.endpoint(&["collections", collection, "documents", id])?;
        self.send_json(self.request(Method::DELETE, url)).await
    }

    async fn delete_documents(&self, collection: &str, filter_by: &str) -> Result<u64> {
        let url = self.endpoint(&["collections", collection, "documents"])?;
        let deleted: DeleteByFilter = self
            .send_json(
                self.request(Method::DELETE, url)
                    .query(&[("filter_by", filter_by)]),
            )
            .await?;
        Ok(deleted.num_deleted)
    }

    async fn import_documents(
        &self,
        collection: &str,
        documents: &[Value],
    ) -> Result<Vec<ImportOutcome>> {
        let url = self.endpoint(&["collections", collection, "documents", "import"])?;

        let mut body = String::new();
        for document in documents {
            body.push_str(&serde_json::to_string(document)?);
            body.push('\n');
        }

        let response = self
            .send(
                self.request(Method::POST, url)
                    .query(&[("action", "upsert")])
                    .header("Content-Type", "text/plain")
                    .body(body),
            )
            .await?;

        response
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<ImportOutcome>(line).map_err(Error::from))
            .collect()
    }

    async fn retrieve_alias(&self, name: &str) -> Result<AliasInfo> {
        let url = self.endpoint(&["aliases", name])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn retrieve_aliases(&self) -> Result<Vec<AliasInfo>> {
        let url = self.endpoint(&["aliases"])?;
        let list: AliasList = self.send_json(self.request(Method::GET, url)).await?;
        Ok(list.aliases)
    }

    async fn upsert_alias(&self, name: &str, collection_name: &str) -> Result<AliasInfo> {
        let url = self.endpoint(&["aliases", name])?;
        self.send_json(
            self.request(Method::PUT, url)
                .json(&json!({ "collection_name": collection_name })),
        )
        .await
    }

    async fn delete_alias(&self, name: &str) -> Result<AliasInfo> {
        let url = self.endpoint(&["aliases", name])?;
        self.send_json(self.request(Method::DELETE, url)).await
    }

    async fn search(&self, collection: &str, params: &SearchParams) -> Result<Value> {
        let url = self.endpoint(&["collections", collection, "documents", "search"])?;
        self.send_json(self.request(Method::GET, url).query(params))
            .await
    }

    async fn multi_search(&self, searches: &[SearchParams]) -> Result<Vec<Value>> {
        let url = self.endpoint(&["multi_search"])?;
        let response: MultiSearchResponse = self
            .send_json(
                self.request(Method::POST, url)
                    .json(&json!({ "searches": searches })),
            )
            .await?;
        Ok(response.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, NodeConfig};

    #[test]
    fn test_backend_creation() {
        let config = ConfigBuilder::new()
            .node(NodeConfig::new("search.internal", 8108, "https"))
            .api_key("xyz")
            .build();
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.base_url(), "https://search.internal:8108/");
        assert_eq!(backend.timeout_secs, 10);
    }

    #[test]
    fn test_endpoint_keeps_name_delimiters() {
        let backend = HttpBackend::with_base_url("http://localhost:8108", None, 5).unwrap();
        let url = backend
            .endpoint(&["collections", "posts:staging@1700000000", "documents"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8108/collections/posts:staging@1700000000/documents"
        );
    }

    #[test]
    fn test_endpoint_escapes_slashes() {
        let backend = HttpBackend::with_base_url("http://localhost:8108", None, 5).unwrap();
        let url = backend.endpoint(&["collections", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8108/collections/a%2Fb");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpBackend::with_base_url("not a url", None, 5).is_err());
    }
}
