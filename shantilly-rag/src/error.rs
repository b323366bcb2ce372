//! Error types for the `shantilly-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while answering a query.
///
/// Every variant maps onto exactly one [`ErrorKind`] through
/// [`RagError::kind`]; callers that only care about the category (for
/// example an HTTP layer choosing a status code) should match on the kind.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied an empty query, a zero `top_k`, or a request
    /// body that does not have the expected shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The embedding provider was unreachable or returned a malformed response.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding provider returned vectors of an unexpected size.
    #[error("Embedding dimension mismatch ({provider}): expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The embedding provider that produced the vector.
        provider: String,
        /// The configured dimensionality of the collection.
        expected: usize,
        /// The dimensionality actually returned.
        actual: usize,
    },

    /// The vector store was unreachable or returned a malformed response.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A relevance scorer failed while reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The scorer that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model was unreachable, or answered with empty or
    /// malformed content.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A network call exceeded its bound.
    #[error("Timeout: {operation} exceeded {limit:?}")]
    Timeout {
        /// The operation that timed out (e.g. `"embedding (Ollama)"`).
        operation: String,
        /// The bound that was exceeded.
        limit: Duration,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// The category of a [`RagError`], stable across providers and backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty query or malformed request shape.
    InvalidInput,
    /// Embedding provider unreachable, malformed, or wrong dimension.
    EmbeddingFailure,
    /// Vector store unreachable or malformed.
    RetrievalFailure,
    /// A pluggable relevance scorer failed.
    RerankFailure,
    /// Language model unreachable, empty, or malformed.
    GenerationFailure,
    /// A network call exceeded its bound.
    TimeoutExceeded,
    /// Invalid configuration at construction time.
    Configuration,
}

impl RagError {
    /// Return the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::EmbeddingError { .. } | Self::DimensionMismatch { .. } => {
                ErrorKind::EmbeddingFailure
            }
            Self::VectorStoreError { .. } => ErrorKind::RetrievalFailure,
            Self::RerankerError { .. } => ErrorKind::RerankFailure,
            Self::GenerationError { .. } => ErrorKind::GenerationFailure,
            Self::Timeout { .. } => ErrorKind::TimeoutExceeded,
            Self::ConfigError(_) => ErrorKind::Configuration,
        }
    }

    /// Shorthand for [`RagError::EmbeddingError`].
    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::EmbeddingError { provider: provider.to_string(), message: message.into() }
    }

    /// Shorthand for [`RagError::GenerationError`].
    pub(crate) fn generation(provider: &str, message: impl Into<String>) -> Self {
        Self::GenerationError { provider: provider.to_string(), message: message.into() }
    }

    /// Shorthand for [`RagError::VectorStoreError`].
    pub(crate) fn vector_store(backend: &str, message: impl Into<String>) -> Self {
        Self::VectorStoreError { backend: backend.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
