use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Config file consulted when `VSEARCH_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config/vsearch.toml";

/// Connection and behaviour settings for the search service client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Service nodes; requests go to the first one
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeConfig>,

    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment label embedded in alias and collection names
    #[serde(default)]
    pub env: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Documents per bulk-import request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Which backend `create_backend` builds
    #[serde(default)]
    pub backend: BackendKind,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, the config file and the environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("VSEARCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = Self::from_sources(&config_path)?;
        config
            .apply_conventional_env(|key| std::env::var(key).ok())
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    /// Layered sources without the conventional `TYPESENSE_*` variables
    pub fn from_sources(config_path: &str) -> std::result::Result<Self, config::ConfigError> {
        let config: Self = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: VSEARCH__)
            .add_source(
                config::Environment::with_prefix("VSEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config.normalized())
    }

    /// Apply `TYPESENSE_URL`, `TYPESENSE_API_KEY` and `TYPESENSE_ENV` on top of the layered values
    pub fn apply_conventional_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TYPESENSE_URL").filter(|v| !v.is_empty()) {
            self.nodes = vec![NodeConfig::from_url(&url)?];
        }
        if let Some(api_key) = lookup("TYPESENSE_API_KEY").filter(|v| !v.is_empty()) {
            self.api_key = Some(api_key);
        }
        if let Some(env) = lookup("TYPESENSE_ENV").filter(|v| !v.is_empty()) {
            self.env = Some(env);
        }
        Ok(())
    }

    /// Check the settings the HTTP backend depends on
    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Http && self.nodes.is_empty() {
            return Err(Error::Configuration(
                "at least one node is required for the http backend".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.env = self.env.filter(|env| !env.is_empty());
        self.api_key = self.api_key.filter(|key| !key.is_empty());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            api_key: None,
            env: None,
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
            backend: BackendKind::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16, protocol: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: protocol.into(),
        }
    }

    /// Parse `protocol://host:port`
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Configuration(format!("invalid node url {}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Configuration(format!("node url {} has no host", url)))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| Error::Configuration(format!("node url {} has no port", url)))?;

        Ok(Self::new(host, port, parsed.scheme()))
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Http,
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Builder for explicit values, which take precedence over every loaded source
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an already loaded configuration
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn node(mut self, node: NodeConfig) -> Self {
        self.config.nodes = vec![node];
        self
    }

    pub fn nodes(mut self, nodes: Vec<NodeConfig>) -> Self {
        self.config.nodes = nodes;
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.config.env = Some(env.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn build(self) -> Config {
        self.config.normalized()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Default value functions
fn default_nodes() -> Vec<NodeConfig> {
    vec![NodeConfig::new("localhost", 8108, "http")]
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_batch_size() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.nodes[0].url(), "http://localhost:8108");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.backend, BackendKind::Http);
        assert!(config.env.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "api_key = \"xyz\"\nenv = \"staging\"\nbatch_size = 40\n\n[[nodes]]\nhost = \"search.internal\"\nport = 443\nprotocol = \"https\""
        )
        .unwrap();

        let config = Config::from_sources(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("xyz"));
        assert_eq!(config.env.as_deref(), Some("staging"));
        assert_eq!(config.batch_size, 40);
        assert_eq!(config.nodes, vec![NodeConfig::new("search.internal", 443, "https")]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::from_sources("does/not/exist.toml").unwrap();
        assert_eq!(config.nodes, default_nodes());
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_conventional_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TYPESENSE_URL", "https://search.example.com:8443"),
            ("TYPESENSE_API_KEY", "secret"),
            ("TYPESENSE_ENV", ""),
        ]);
        let mut config = Config::default();
        config
            .apply_conventional_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.nodes, vec![NodeConfig::new("search.example.com", 8443, "https")]);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert!(config.env.is_none());
    }

    #[test]
    fn test_explicit_values_win() {
        let loaded = ConfigBuilder::new().api_key("from-env").env("test").build();
        let config = ConfigBuilder::from_config(loaded).api_key("explicit").build();
        assert_eq!(config.api_key.as_deref(), Some("explicit"));
        assert_eq!(config.env.as_deref(), Some("test"));
    }

    #[test]
    fn test_empty_env_is_absent() {
        let config = ConfigBuilder::new().env("").build();
        assert!(config.env.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        assert!(ConfigBuilder::new().batch_size(0).build().validate().is_err());
        assert!(ConfigBuilder::new().nodes(vec![]).build().validate().is_err());
        assert!(ConfigBuilder::new()
            .nodes(vec![])
            .backend(BackendKind::InMemory)
            .build()
            .validate()
            .is_ok());
    }

    #[test]
    fn test_node_from_url_default_port() {
        let node = NodeConfig::from_url("https://search.example.com").unwrap();
        assert_eq!(node.port, 443);
        assert!(NodeConfig::from_url("not a url").is_err());
    }
}
