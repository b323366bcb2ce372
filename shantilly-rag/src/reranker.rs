//! Second-stage reranking of retrieved candidates.
//!
//! The [`Reranker`] owns ordering and truncation; a pluggable
//! [`RelevanceScorer`] only supplies the scores. Whatever the scorer, ties
//! keep retrieval order and the result holds at most `top_k` chunks.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::RerankConfig;
use crate::document::{DocumentChunk, RankedSet};
use crate::error::{RagError, Result};

/// Computes a relevance score for each candidate.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// other strategies to improve precision beyond initial vector similarity.
/// Must return exactly one score per document, in input order.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// A short name used in errors and logs.
    fn name(&self) -> &str;

    /// Score `docs` against `query` (higher is more relevant).
    ///
    /// Scores must depend only on the query and each chunk's retrieval
    /// data, not on `rerank_score`.
    async fn score(&self, query: &str, docs: &[DocumentChunk]) -> Result<Vec<f32>>;
}

/// Uses the score the vector store already assigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalScoreScorer;

#[async_trait]
impl RelevanceScorer for RetrievalScoreScorer {
    fn name(&self) -> &str {
        "retrieval-score"
    }

    async fn score(&self, _query: &str, docs: &[DocumentChunk]) -> Result<Vec<f32>> {
        Ok(docs.iter().map(|d| d.score).collect())
    }
}

/// Boosts candidates whose text contains words of the query.
///
/// Each query word longer than three characters found in a passage
/// (case-insensitively) adds `boost_per_keyword` to its retrieval score.
/// The boost is always applied to `score`, never to an earlier
/// `rerank_score`, so reranking twice gives the same result.
#[derive(Debug, Clone, Copy)]
pub struct KeywordBoostScorer {
    boost_per_keyword: f32,
}

impl KeywordBoostScorer {
    /// Create a scorer adding `boost_per_keyword` per matching keyword.
    pub fn new(boost_per_keyword: f32) -> Self {
        Self { boost_per_keyword }
    }
}

#[async_trait]
impl RelevanceScorer for KeywordBoostScorer {
    fn name(&self) -> &str {
        "keyword-boost"
    }

    async fn score(&self, query: &str, docs: &[DocumentChunk]) -> Result<Vec<f32>> {
        let keywords: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 3)
            .map(str::to_lowercase)
            .collect();

        Ok(docs
            .iter()
            .map(|doc| {
                let text = doc.text.to_lowercase();
                let hits = keywords.iter().filter(|kw| text.contains(kw.as_str())).count();
                doc.score + hits as f32 * self.boost_per_keyword
            })
            .collect())
    }
}

/// Reorders and truncates candidates according to a [`RerankConfig`].
///
/// # Example
///
/// ```rust,ignore
/// use shantilly_rag::{RerankConfig, Reranker};
///
/// let reranker = Reranker::new(RerankConfig { enabled: true, top_k: Some(2) });
/// let ranked = reranker.rerank("query", &candidates).await?;
/// ```
#[derive(Clone)]
pub struct Reranker {
    config: RerankConfig,
    scorer: Arc<dyn RelevanceScorer>,
}

impl Reranker {
    /// Create a reranker that sorts by the existing retrieval score.
    pub fn new(config: RerankConfig) -> Self {
        Self { config, scorer: Arc::new(RetrievalScoreScorer) }
    }

    /// Replace the relevance scorer.
    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> RerankConfig {
        self.config
    }

    /// Rerank `docs` for `query`, producing a new [`RankedSet`].
    ///
    /// Disabled: the input order and length are kept. Enabled: candidates
    /// are sorted by descending scorer score (recorded in `rerank_score`,
    /// while `score` keeps the retrieval value), ties keep input order, and
    /// the result is cut to `top_k` (no cut when `top_k` is unset).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RerankerError`] if the scorer fails or returns the
    /// wrong number of scores.
    pub async fn rerank(&self, query: &str, docs: &[DocumentChunk]) -> Result<RankedSet> {
        if !self.config.enabled {
            return Ok(RankedSet::from_ordered(docs.to_vec()));
        }

        let name = self.scorer.name();
        let scores = self.scorer.score(query, docs).await.map_err(|e| match e {
            RagError::RerankerError { .. } => e,
            other => RagError::RerankerError { reranker: name.to_string(), message: other.to_string() },
        })?;
        if scores.len() != docs.len() {
            error!(reranker = name, expected = docs.len(), actual = scores.len(), "score count mismatch");
            return Err(RagError::RerankerError {
                reranker: name.to_string(),
                message: format!("expected {} scores, got {}", docs.len(), scores.len()),
            });
        }

        let mut ranked: Vec<DocumentChunk> = docs
            .iter()
            .zip(scores)
            .map(|(doc, score)| DocumentChunk { rerank_score: Some(score), ..doc.clone() })
            .collect();
        // `sort_by` is stable: equal scores keep retrieval order.
        ranked.sort_by(|a, b| descending(a.relevance(), b.relevance()));
        if let Some(top_k) = self.config.top_k {
            ranked.truncate(top_k);
        }

        debug!(reranker = name, input = docs.len(), output = ranked.len(), "reranked");
        Ok(RankedSet::from_ordered(ranked))
    }
}

/// Descending order with NaN below every number.
fn descending(a: f32, b: f32) -> Ordering {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    key(b).total_cmp(&key(a))
}
