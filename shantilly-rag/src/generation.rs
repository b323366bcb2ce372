//! Generation provider trait and the timeout-enforcing client wrapper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// A language model that turns a prompt into text.
///
/// Contract: a successful call returns the model's content. Providers
/// report transport failures as [`RagError::GenerationError`] and their
/// own timeouts as [`RagError::Timeout`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// A short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Send `prompt` to the model and return its reply.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Wraps a [`GenerationProvider`] with a bounded timeout and rejects empty
/// replies.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
}

impl GenerationClient {
    /// Create a client that gives up after `timeout`.
    pub fn new(provider: Arc<dyn GenerationProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// The name of the wrapped provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate a reply to `prompt`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Timeout`] if the provider does not answer in time.
    /// - [`RagError::GenerationError`] if the reply is empty or whitespace.
    /// - Any error reported by the provider, unchanged.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let name = self.provider.name();
        debug!(provider = name, prompt_len = prompt.len(), "generating");

        let text = tokio::time::timeout(self.timeout, self.provider.generate(prompt))
            .await
            .map_err(|_| {
                error!(provider = name, timeout = ?self.timeout, "generation timed out");
                RagError::Timeout { operation: format!("generation ({name})"), limit: self.timeout }
            })??;

        if text.trim().is_empty() {
            error!(provider = name, "model returned empty content");
            return Err(RagError::generation(name, "model returned empty content"));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::ScriptedGenerationProvider;

    #[tokio::test]
    async fn whitespace_reply_is_a_generation_failure() {
        let client = GenerationClient::new(
            Arc::new(ScriptedGenerationProvider::replying("  \n")),
            Duration::from_secs(1),
        );
        let err = client.generate("prompt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationFailure);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let provider =
            ScriptedGenerationProvider::replying("late").with_delay(Duration::from_secs(30));
        let client = GenerationClient::new(Arc::new(provider), Duration::from_secs(2));
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, RagError::Timeout { .. }));
    }
}
