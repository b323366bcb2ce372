//! Configuration for the query pipeline.
//!
//! A [`RagConfig`] is read once (typically from `config/retrieval.yaml`)
//! and handed to each component's constructor. Nothing in this crate reads
//! configuration from process-wide state on its own.
//!
//! ```yaml
//! collection: shantilly_docs
//! retrieval:
//!   vector:
//!     top_k: 40
//! rerank:
//!   enabled: true
//!   top_k: 8
//! embedding:
//!   model: nomic-embed-text
//!   dimensions: 768
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::prompt::PromptTemplate;

/// Collection searched when the configuration names none.
pub const DEFAULT_COLLECTION: &str = "shantilly_docs";

/// Base URL of a local Ollama server, the default for both providers.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Which HTTP API a provider speaks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// A local or remote Ollama server.
    #[default]
    Ollama,
    /// The OpenAI API or any OpenAI-compatible server.
    OpenAI,
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Name of the vector store collection to search.
    pub collection: String,
    /// First-stage retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Second-stage reranking settings.
    pub rerank: RerankConfig,
    /// Query rewriting settings.
    pub rewrite: RewriteConfig,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Language model settings.
    pub generation: GenerationConfig,
    /// Qdrant connection settings.
    pub qdrant: QdrantConfig,
    /// Prompt wording.
    pub prompt: PromptTemplate,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            retrieval: RetrievalConfig::default(),
            rerank: RerankConfig::default(),
            rewrite: RewriteConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            qdrant: QdrantConfig::default(),
            prompt: PromptTemplate::default(),
        }
    }
}

/// First-stage retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Vector search settings.
    pub vector: VectorRetrievalConfig,
}

/// Vector search settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorRetrievalConfig {
    /// Number of candidates fetched from the vector store.
    pub top_k: usize,
}

impl Default for VectorRetrievalConfig {
    fn default() -> Self {
        Self { top_k: 40 }
    }
}

/// Reranking settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RerankConfig {
    /// When `false` the reranker passes candidates through untouched.
    pub enabled: bool,
    /// Number of candidates kept after reranking. `None` keeps all of them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

/// Query rewriting settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RewriteConfig {
    /// When `false` queries are searched verbatim.
    pub enabled: bool,
    /// How many of the most recent history turns the rewriter sees.
    pub max_turns: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self { enabled: false, max_turns: 6 }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which API to call.
    pub provider: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// Base URL of the provider. With `provider: openai`, leaving the
    /// Ollama default (or an empty string) selects `https://api.openai.com/v1`.
    pub base_url: String,
    /// Dimensionality the collection was indexed with.
    pub dimensions: usize,
    /// Prefix prepended to queries (asymmetric models).
    pub query_prefix: String,
    /// Prefix prepended to passages at indexing time.
    pub document_prefix: String,
    /// Environment variable holding the API key, if the provider needs one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Bound on a single embedding call.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "nomic-embed-text".to_string(),
            base_url: OLLAMA_BASE_URL.to_string(),
            dimensions: 768,
            query_prefix: "search_query: ".to_string(),
            document_prefix: "search_document: ".to_string(),
            api_key_env: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    /// The per-call bound as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Which API to call.
    pub provider: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// Base URL of the provider. With `provider: openai`, leaving the
    /// Ollama default (or an empty string) selects `https://api.openai.com/v1`.
    pub base_url: String,
    /// Environment variable holding the API key, if the provider needs one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Sampling temperature; provider default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Bound on a single generation call.
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "phi3:medium".to_string(),
            base_url: OLLAMA_BASE_URL.to_string(),
            api_key_env: None,
            temperature: None,
            timeout_secs: 120,
        }
    }
}

impl GenerationConfig {
    /// The per-call bound as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Qdrant connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    /// gRPC endpoint.
    pub url: String,
    /// API key, for Qdrant Cloud.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Bound on a single search.
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self { url: "http://localhost:6334".to_string(), api_key: None, timeout_secs: 10 }
    }
}

impl QdrantConfig {
    /// The per-call bound as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse and validate a YAML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] on malformed YAML or invalid values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| RagError::ConfigError(format!("invalid YAML: {e}")))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply overrides from the process environment.
    ///
    /// Recognises `QDRANT_URL`, `QDRANT_API_KEY`, `OLLAMA_BASE_URL`,
    /// `OLLAMA_CHAT_MODEL` and `OLLAMA_EMBED_MODEL`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; see [`RagConfig::with_env_overrides`].
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("QDRANT_URL") {
            self.qdrant.url = url;
        }
        if let Some(key) = lookup("QDRANT_API_KEY") {
            self.qdrant.api_key = Some(key);
        }
        if let Some(base) = lookup("OLLAMA_BASE_URL") {
            if self.embedding.provider == ProviderKind::Ollama {
                self.embedding.base_url = base.clone();
            }
            if self.generation.provider == ProviderKind::Ollama {
                self.generation.base_url = base;
            }
        }
        if let Some(model) = lookup("OLLAMA_CHAT_MODEL") {
            self.generation.model = model;
        }
        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            self.embedding.model = model;
        }
        self
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `collection` is blank
    /// - `retrieval.vector.top_k == 0` or `rerank.top_k == Some(0)`
    /// - `embedding.dimensions == 0`
    /// - any timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(RagError::ConfigError("collection must not be empty".to_string()));
        }
        if self.retrieval.vector.top_k == 0 {
            return Err(RagError::ConfigError(
                "retrieval.vector.top_k must be greater than zero".to_string(),
            ));
        }
        if self.rerank.top_k == Some(0) {
            return Err(RagError::ConfigError("rerank.top_k must be greater than zero".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        for (name, secs) in [
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("generation.timeout_secs", self.generation.timeout_secs),
            ("qdrant.timeout_secs", self.qdrant.timeout_secs),
        ] {
            if secs == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl Default for RagConfigBuilder {
    fn default() -> Self {
        Self { config: RagConfig::default() }
    }
}

impl RagConfigBuilder {
    /// Set the collection to search.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the number of candidates fetched from the vector store.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.retrieval.vector.top_k = k;
        self
    }

    /// Enable or disable reranking.
    pub fn rerank_enabled(mut self, enabled: bool) -> Self {
        self.config.rerank.enabled = enabled;
        self
    }

    /// Set how many candidates survive reranking.
    pub fn rerank_top_k(mut self, k: usize) -> Self {
        self.config.rerank.top_k = Some(k);
        self
    }

    /// Enable or disable query rewriting.
    pub fn rewrite_enabled(mut self, enabled: bool) -> Self {
        self.config.rewrite.enabled = enabled;
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding.model = model.into();
        self
    }

    /// Set the dimensionality the collection was indexed with.
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding.dimensions = dimensions;
        self
    }

    /// Replace the prompt wording.
    pub fn prompt(mut self, prompt: PromptTemplate) -> Self {
        self.config.prompt = prompt;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
