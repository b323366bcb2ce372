//! # shantilly-rag
//!
//! Query-time retrieval-augmented generation: a question (plus the
//! conversation so far) goes in, a grounded answer and the passages it was
//! grounded on come out.
//!
//! ```text
//! history + query ─► QueryRewriter ─► Retriever ─► Reranker ─► PromptTemplate ─► GenerationClient
//!                                      │    │
//!                          EmbeddingClient  VectorStore
//! ```
//!
//! Indexing the corpus is out of scope: the crate searches a collection
//! that something else has filled, reading the passage from the payload's
//! `text` field and treating every other field as metadata.
//!
//! ## Features
//!
//! - `ollama`: [`ollama::OllamaEmbeddingProvider`], [`ollama::OllamaGenerationProvider`]
//! - `openai`: [`openai::OpenAIEmbeddingProvider`], [`openai::OpenAICompatibleGenerationProvider`]
//! - `qdrant`: [`qdrant::QdrantVectorStore`]
//! - `full`: all of the above

pub mod api;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod pipeline;
pub mod prompt;
pub mod reranker;
pub mod retriever;
pub mod rewriter;
pub mod testing;
pub mod vectorstore;

#[cfg(any(feature = "ollama", feature = "openai"))]
mod http;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use api::{DocumentPayload, QueryRequest, QueryResponse};
pub use config::{
    EmbeddingConfig, GenerationConfig, ProviderKind, QdrantConfig, RagConfig, RagConfigBuilder,
    RerankConfig, RetrievalConfig, RewriteConfig, VectorRetrievalConfig,
};
pub use document::{
    Answer, ConversationTurn, DocumentChunk, Metadata, MetadataValue, RankedSet, Role,
    SourceAttribution, UNKNOWN_SOURCE,
};
pub use embedding::{EmbedTask, EmbeddingClient, EmbeddingProvider};
pub use error::{ErrorKind, RagError, Result};
pub use generation::{GenerationClient, GenerationProvider};
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{PipelineStage, RagPipeline, RagPipelineBuilder};
pub use prompt::{Prompt, PromptTemplate};
pub use reranker::{KeywordBoostScorer, RelevanceScorer, Reranker, RetrievalScoreScorer};
pub use retriever::{Retriever, chunk_from_point};
pub use rewriter::{LlmQueryRewriter, PassthroughRewriter, QueryRewriter};
pub use vectorstore::{ScoredPoint, TEXT_FIELD, VectorStore};
