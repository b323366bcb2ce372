//! RAG query pipeline orchestrator.
//!
//! The [`RagPipeline`] runs one query through a fixed sequence of stages:
//!
//! ```text
//! Received → Rewritten → Retrieved → Reranked → PromptBuilt → Generated → Done
//! ```
//!
//! Every stage runs exactly once. The first error aborts the run and is
//! returned unchanged; no partial [`Answer`] is ever produced. Dropping the
//! returned future cancels whatever network call is in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use shantilly_rag::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::builder().collection("docs").build()?)
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generation_provider(Arc::new(my_model))
//!     .build()?;
//!
//! let answer = pipeline.answer("What is X?", &[]).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span};

use crate::config::{RagConfig, RerankConfig};
use crate::document::{Answer, ConversationTurn};
use crate::embedding::{EmbeddingClient, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::{GenerationClient, GenerationProvider};
use crate::prompt::PromptTemplate;
use crate::reranker::{RelevanceScorer, Reranker};
use crate::retriever::Retriever;
use crate::rewriter::{LlmQueryRewriter, PassthroughRewriter, QueryRewriter};
use crate::vectorstore::VectorStore;

/// The stages of one pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// The query was accepted.
    Received,
    /// The search query was derived from the conversation.
    Rewritten,
    /// Candidates were fetched from the vector store.
    Retrieved,
    /// Candidates were reordered and truncated.
    Reranked,
    /// The generation prompt was assembled.
    PromptBuilt,
    /// The model replied.
    Generated,
    /// The answer was assembled.
    Done,
}

impl PipelineStage {
    /// Lowercase stage name, as logged.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Rewritten => "rewritten",
            Self::Retrieved => "retrieved",
            Self::Reranked => "reranked",
            Self::PromptBuilt => "prompt_built",
            Self::Generated => "generated",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The RAG query pipeline.
///
/// Holds only read-only handles; one instance serves concurrent queries
/// without locking. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    rewriter: Arc<dyn QueryRewriter>,
    retriever: Retriever,
    top_k: usize,
    reranker: Reranker,
    prompt: PromptTemplate,
    generator: GenerationClient,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// The retriever used for the first stage.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// The prompt wording in use.
    pub fn prompt_template(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// Answer `query` given the conversation `history` (oldest turn first).
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for a blank query.
    /// - The error of the first failing stage, unchanged: embedding,
    ///   vector store, reranker, generation, or timeout.
    pub async fn answer(&self, query: &str, history: &[ConversationTurn]) -> Result<Answer> {
        let span = info_span!("rag_query", collection = %self.retriever.collection());
        self.run(query, history).instrument(span).await
    }

    async fn run(&self, query: &str, history: &[ConversationTurn]) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".to_string()));
        }
        debug!(stage = %PipelineStage::Received, history_len = history.len());

        let search_query = self.rewriter.rewrite(history, query).await;
        debug!(stage = %PipelineStage::Rewritten, search_query = %search_query);

        let candidates = self.retriever.retrieve(&search_query, self.top_k).await?;
        debug!(stage = %PipelineStage::Retrieved, candidate_count = candidates.len());

        let documents = self.reranker.rerank(&search_query, &candidates).await?;
        debug!(stage = %PipelineStage::Reranked, document_count = documents.len());

        let prompt = self.prompt.build_prompt(&search_query, &documents);
        debug!(stage = %PipelineStage::PromptBuilt, prompt_len = prompt.as_str().len());

        let text = self.generator.generate(prompt.as_str()).await?;
        debug!(stage = %PipelineStage::Generated, answer_len = text.len());

        let answer = Answer::new(text, search_query, documents);
        info!(
            stage = %PipelineStage::Done,
            document_count = answer.documents.len(),
            "query answered"
        );
        Ok(answer)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, `vector_store` and `generation_provider`
/// are required. Without an explicit rewriter the pipeline uses
/// [`LlmQueryRewriter`] when `rewrite.enabled` is set and
/// [`PassthroughRewriter`] otherwise.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(config)
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .generation_provider(Arc::new(model))
///     .scorer(Arc::new(KeywordBoostScorer::new(0.05)))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    rewriter: Option<Arc<dyn QueryRewriter>>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the language model.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Override the query rewriter.
    pub fn rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Override the relevance scorer used when reranking is enabled.
    pub fn scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;

        let embedder = EmbeddingClient::new(
            embedding_provider,
            config.embedding.dimensions,
            config.embedding.timeout(),
        );
        let retriever = Retriever::new(embedder, vector_store, config.collection.clone());

        let rewriter = match self.rewriter {
            Some(rewriter) => rewriter,
            None if config.rewrite.enabled => Arc::new(LlmQueryRewriter::new(
                generation_provider.clone(),
                config.generation.timeout(),
                config.rewrite.max_turns,
            )),
            None => Arc::new(PassthroughRewriter),
        };

        let rerank: RerankConfig = config.rerank;
        let reranker = match self.scorer {
            Some(scorer) => Reranker::new(rerank).with_scorer(scorer),
            None => Reranker::new(rerank),
        };

        Ok(RagPipeline {
            rewriter,
            retriever,
            top_k: config.retrieval.vector.top_k,
            reranker,
            prompt: config.prompt,
            generator: GenerationClient::new(generation_provider, config.generation.timeout()),
        })
    }
}
