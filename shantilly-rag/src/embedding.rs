//! Embedding provider trait and the dimension-checking client wrapper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// What an embedding will be used for.
///
/// Providers with asymmetric models (e.g. `nomic-embed-text`, Gemini
/// `RetrievalQuery`/`RetrievalDocument`) embed queries and passages
/// differently; others ignore the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedTask {
    /// A search query.
    Query,
    /// A passage being indexed.
    Document,
}

/// A provider that generates vector embeddings from text input.
///
/// Contract: `embed_batch` returns exactly one vector per input, in input
/// order. Providers report transport failures as
/// [`RagError::EmbeddingError`] and their own timeouts as
/// [`RagError::Timeout`].
///
/// # Example
///
/// ```rust,ignore
/// use shantilly_rag::{EmbedTask, EmbeddingProvider};
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world", EmbedTask::Query).await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// A short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str], task: EmbedTask) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>> {
        self.embed_batch(&[text], task).await?.into_iter().next().ok_or_else(|| {
            RagError::embedding(self.name(), "provider returned no embedding")
        })
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Wraps an [`EmbeddingProvider`] with a bounded timeout and a dimension check.
///
/// The expected dimension is the one the collection was indexed with, not
/// what the provider claims: a mismatch is fatal and never padded or
/// truncated.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    expected_dimensions: usize,
    timeout: Duration,
}

impl EmbeddingClient {
    /// Create a client expecting vectors of `expected_dimensions`.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        expected_dimensions: usize,
        timeout: Duration,
    ) -> Self {
        Self { provider, expected_dimensions, timeout }
    }

    /// The dimensionality every returned vector must have.
    pub fn expected_dimensions(&self) -> usize {
        self.expected_dimensions
    }

    /// Embed a search query.
    ///
    /// # Errors
    ///
    /// - [`RagError::Timeout`] if the provider does not answer in time.
    /// - [`RagError::DimensionMismatch`] if the vector has the wrong size.
    /// - Any error reported by the provider, unchanged.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let name = self.provider.name();
        debug!(provider = name, text_len = query.len(), "embedding query");

        let vector = tokio::time::timeout(self.timeout, self.provider.embed(query, EmbedTask::Query))
            .await
            .map_err(|_| {
                error!(provider = name, timeout = ?self.timeout, "embedding timed out");
                RagError::Timeout { operation: format!("embedding ({name})"), limit: self.timeout }
            })??;

        if vector.len() != self.expected_dimensions {
            error!(
                provider = name,
                expected = self.expected_dimensions,
                actual = vector.len(),
                "embedding dimension mismatch"
            );
            return Err(RagError::DimensionMismatch {
                provider: name.to_string(),
                expected: self.expected_dimensions,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }
}
