//! OpenAI embedding and chat-completion providers.
//!
//! This module is only available when the `openai` feature is enabled. The
//! chat provider also works with OpenAI-compatible servers (vLLM,
//! llama.cpp, Groq, Ollama's `/v1`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EmbeddingConfig, GenerationConfig, OLLAMA_BASE_URL};
use crate::embedding::{EmbedTask, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::http::{self, Side};

const PROVIDER: &str = "OpenAI";

/// The default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The environment variable read when no key variable is configured.
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

fn api_key_from_env(side: Side, var: Option<&str>) -> Result<String> {
    let var = var.unwrap_or(DEFAULT_API_KEY_ENV);
    std::env::var(var)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| side.error(PROVIDER, format!("{var} environment variable not set")))
}

fn base_url_or_default(base_url: &str) -> &str {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.is_empty() { OPENAI_BASE_URL } else { trimmed }
}

/// A configured base URL still at the Ollama default means none was chosen
/// for this provider.
fn configured_base_url(base_url: &str) -> &str {
    if base_url.trim_end_matches('/') == OLLAMA_BASE_URL { OPENAI_BASE_URL } else { base_url }
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// OpenAI embedding models are symmetric, so the task is ignored.
///
/// # Example
///
/// ```rust,ignore
/// use shantilly_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...", Duration::from_secs(30))?
///     .with_model("text-embedding-3-small")
///     .with_dimensions(768);
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    timeout: Duration,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key, using
    /// `text-embedding-3-small` (1536 dimensions).
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::embedding(PROVIDER, "API key must not be empty"));
        }

        Ok(Self {
            client: http::client(timeout)?,
            endpoint: format!("{OPENAI_BASE_URL}/embeddings"),
            api_key,
            model: "text-embedding-3-small".into(),
            dimensions: 1536,
            request_dimensions: None,
            timeout,
        })
    }

    /// Create a provider from the embedding section of the configuration.
    ///
    /// The key is read from `api_key_env` (default `OPENAI_API_KEY`).
    /// The configured dimensions are requested from the API.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = api_key_from_env(Side::Embedding, config.api_key_env.as_deref())?;
        Ok(Self::new(api_key, config.timeout())?
            .with_base_url(configured_base_url(&config.base_url))
            .with_model(&config.model)
            .with_dimensions(config.dimensions))
    }

    /// Send requests to an OpenAI-compatible server instead of the OpenAI API.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.endpoint = format!("{}/embeddings", base_url_or_default(base_url));
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed_batch(&self, texts: &[&str], _task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let body =
            EmbeddingRequest { model: &self.model, input: texts, dimensions: self.request_dimensions };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::request_error(Side::Embedding, PROVIDER, self.timeout, e))?;
        let parsed: EmbeddingResponse =
            http::read_json(Side::Embedding, PROVIDER, self.timeout, response).await?;

        if parsed.data.len() != texts.len() {
            return Err(RagError::embedding(
                PROVIDER,
                format!("expected {} embeddings, got {}", texts.len(), parsed.data.len()),
            ));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A [`GenerationProvider`] speaking the `/chat/completions` protocol.
pub struct OpenAICompatibleGenerationProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl OpenAICompatibleGenerationProvider {
    /// Create a provider for `model` at `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            endpoint: format!("{}/chat/completions", base_url_or_default(base_url)),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            temperature: None,
            timeout,
        })
    }

    /// Create a provider from the generation section of the configuration.
    ///
    /// A key is only required when `api_key_env` is set; local
    /// OpenAI-compatible servers usually accept anonymous requests.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = match config.api_key_env.as_deref() {
            Some(var) => Some(api_key_from_env(Side::Generation, Some(var))?),
            None => std::env::var(DEFAULT_API_KEY_ENV).ok(),
        };
        let base_url = configured_base_url(&config.base_url);
        let provider = Self::new(base_url, api_key, &config.model, config.timeout())?;
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
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [CompletionMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl GenerationProvider for OpenAICompatibleGenerationProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "chat completion");

        let body = CompletionRequest {
            model: &self.model,
            messages: [CompletionMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| http::request_error(Side::Generation, PROVIDER, self.timeout, e))?;
        let parsed: CompletionResponse =
            http::read_json(Side::Generation, PROVIDER, self.timeout, response).await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RagError::generation(PROVIDER, "response has no choices with content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn ollama_default_url_falls_back_to_openai() {
        let config = GenerationConfig { provider: ProviderKind::OpenAI, ..Default::default() };
        let provider = OpenAICompatibleGenerationProvider::from_config(&config).unwrap();
        assert_eq!(provider.endpoint, "https://api.openai.com/v1/chat/completions");

        assert_eq!(configured_base_url("http://localhost:11434/"), OPENAI_BASE_URL);
        assert_eq!(configured_base_url("http://localhost:11434/v1"), "http://localhost:11434/v1");
        assert_eq!(base_url_or_default(configured_base_url("")), OPENAI_BASE_URL);
    }

    #[test]
    fn explicit_url_is_kept() {
        let config = GenerationConfig {
            provider: ProviderKind::OpenAI,
            base_url: "http://vllm:8000/v1/".into(),
            ..Default::default()
        };
        let provider = OpenAICompatibleGenerationProvider::from_config(&config).unwrap();
        assert_eq!(provider.endpoint, "http://vllm:8000/v1/chat/completions");

        let embedder = OpenAIEmbeddingProvider::new("sk-test", Duration::from_secs(5))
            .unwrap()
            .with_base_url(configured_base_url(OLLAMA_BASE_URL));
        assert_eq!(embedder.endpoint, "https://api.openai.com/v1/embeddings");
    }
}
