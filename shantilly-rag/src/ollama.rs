//! Ollama embedding and chat providers.
//!
//! This module is only available when the `ollama` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use shantilly_rag::ollama::{OllamaEmbeddingProvider, OllamaGenerationProvider};
//!
//! let embedder = OllamaEmbeddingProvider::from_config(&config.embedding)?;
//! let model = OllamaGenerationProvider::from_config(&config.generation)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::embedding::{EmbedTask, EmbeddingProvider};
use crate::error::Result;
use crate::generation::GenerationProvider;
use crate::http::{self, Side};

const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
///
/// Asymmetric models such as `nomic-embed-text` expect a task prefix
/// (`search_query: ` / `search_document: `); the prefix for the requested
/// [`EmbedTask`] is prepended to every input.
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    query_prefix: String,
    document_prefix: String,
    timeout: Duration,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `model` served at `base_url`, without task prefixes.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.into(),
            dimensions,
            query_prefix: String::new(),
            document_prefix: String::new(),
            timeout,
        })
    }

    /// Create a provider from the embedding section of the configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::new(&config.base_url, &config.model, config.dimensions, config.timeout())?
            .with_prefixes(&config.query_prefix, &config.document_prefix))
    }

    /// Set the prefixes prepended to queries and passages.
    pub fn with_prefixes(mut self, query: impl Into<String>, document: impl Into<String>) -> Self {
        self.query_prefix = query.into();
        self.document_prefix = document.into();
        self
    }

    fn prefix(&self, task: EmbedTask) -> &str {
        match task {
            EmbedTask::Query => &self.query_prefix,
            EmbedTask::Document => &self.document_prefix,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed_batch(&self, texts: &[&str], task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, ?task, "embedding batch");

        let prefix = self.prefix(task);
        let body = EmbedRequest {
            model: &self.model,
            input: texts.iter().map(|t| format!("{prefix}{t}")).collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::request_error(Side::Embedding, PROVIDER, self.timeout, e))?;
        let parsed: EmbedResponse =
            http::read_json(Side::Embedding, PROVIDER, self.timeout, response).await?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Side::Embedding.error(
                PROVIDER,
                format!("expected {} embeddings, got {}", texts.len(), parsed.embeddings.len()),
            ));
        }
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A [`GenerationProvider`] backed by Ollama's `/api/chat` endpoint
/// (non-streaming).
pub struct OllamaGenerationProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl OllamaGenerationProvider {
    /// Create a provider for `model` served at `base_url`.
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.into(),
            temperature: None,
            timeout,
        })
    }

    /// Create a provider from the generation section of the configuration.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let provider = Self::new(&config.base_url, &config.model, config.timeout())?;
        Ok(match config.temperature {
            Some(t) => provider.with_temperature(t),
            None => provider,
        })
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatReply>,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl GenerationProvider for OllamaGenerationProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "chat request");

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            stream: false,
            options: self.temperature.map(|temperature| ChatOptions { temperature }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::request_error(Side::Generation, PROVIDER, self.timeout, e))?;
        let parsed: ChatResponse =
            http::read_json(Side::Generation, PROVIDER, self.timeout, response).await?;

        parsed
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Side::Generation.error(PROVIDER, "response has no message content"))
    }
}
