//! Wiring: configuration loading and provider construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use shantilly_rag::ollama::{OllamaEmbeddingProvider, OllamaGenerationProvider};
use shantilly_rag::openai::{OpenAICompatibleGenerationProvider, OpenAIEmbeddingProvider};
use shantilly_rag::qdrant::QdrantVectorStore;
use shantilly_rag::{
    EmbeddingConfig, EmbeddingProvider, GenerationConfig, GenerationProvider, ProviderKind,
    RagConfig, RagPipeline,
};
use tracing::{debug, info};

/// Where the configuration is looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/retrieval.yaml";

/// Load the configuration and apply environment overrides.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
/// used if present and the built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<RagConfig> {
    let config = match path {
        Some(path) => RagConfig::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                RagConfig::from_path(&default)
                    .with_context(|| format!("Failed to load config from {}", default.display()))?
            } else {
                debug!("no config file found, using defaults");
                RagConfig::builder().build()?
            }
        }
    };

    let config = config.with_env_overrides();
    config.validate().context("Invalid configuration after environment overrides")?;
    Ok(config)
}

/// Build the embedding provider named by the configuration.
pub fn embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Ollama => Arc::new(OllamaEmbeddingProvider::from_config(config)?),
        ProviderKind::OpenAI => Arc::new(OpenAIEmbeddingProvider::from_config(config)?),
    };
    Ok(provider)
}

/// Build the language model named by the configuration.
pub fn generation_provider(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    let provider: Arc<dyn GenerationProvider> = match config.provider {
        ProviderKind::Ollama => Arc::new(OllamaGenerationProvider::from_config(config)?),
        ProviderKind::OpenAI => Arc::new(OpenAICompatibleGenerationProvider::from_config(config)?),
    };
    Ok(provider)
}

/// Build a pipeline backed by Qdrant and the configured providers.
pub fn build_pipeline(config: &RagConfig) -> Result<RagPipeline> {
    let store = QdrantVectorStore::new(
        &config.qdrant.url,
        config.qdrant.api_key.clone(),
        config.qdrant.timeout(),
    )
    .context("Failed to create Qdrant client")?;

    info!(
        collection = %config.collection,
        qdrant = %config.qdrant.url,
        embedding_model = %config.embedding.model,
        chat_model = %config.generation.model,
        "pipeline configured"
    );

    RagPipeline::builder()
        .config(config.clone())
        .embedding_provider(embedding_provider(&config.embedding)?)
        .vector_store(Arc::new(store))
        .generation_provider(generation_provider(&config.generation)?)
        .build()
        .context("Failed to build pipeline")
}

/// The configuration as YAML, with secrets masked.
pub fn render_config(config: &RagConfig) -> Result<String> {
    let mut shown = config.clone();
    if shown.qdrant.api_key.is_some() {
        shown.qdrant.api_key = Some("<redacted>".to_string());
    }
    serde_yaml::to_string(&shown).context("Failed to serialize config")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn explicit_config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "collection: go_docs\nrerank:\n  enabled: true\n  top_k: 4").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.collection, "go_docs");
        assert_eq!(config.rerank.top_k, Some(4));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/retrieval.yaml"))).unwrap_err();
        assert!(format!("{err:#}").contains("retrieval.yaml"));
    }

    #[test]
    fn rendered_config_masks_api_key() {
        let mut config = RagConfig::builder().build().unwrap();
        config.qdrant.api_key = Some("secret-key".to_string());

        let yaml = render_config(&config).unwrap();
        assert!(!yaml.contains("secret-key"));
        assert!(yaml.contains("<redacted>"));
        assert!(yaml.contains("collection: shantilly_docs"));
    }
}
