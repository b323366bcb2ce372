//! Request and response bodies of the inbound query API.
//!
//! ```json
//! { "query": "and how do I add flags?",
//!   "history": [{"role": "user", "content": "What is cobra?"}] }
//! ```
//!
//! ```json
//! { "answer": "...",
//!   "documents": [{"id": "17", "score": 0.83, "text": "...", "metadata": {"source": "..."}}] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::document::{Answer, ConversationTurn, DocumentChunk, Metadata};
use crate::error::{RagError, Result};
use crate::pipeline::RagPipeline;

/// Body of a query request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    /// The question to answer.
    pub query: String,
    /// Earlier turns, oldest first. Kept untyped so that a malformed entry
    /// only loses that entry.
    #[serde(default)]
    pub history: Vec<Value>,
}

impl QueryRequest {
    /// A request with no history.
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), history: Vec::new() }
    }

    /// Parse a JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if the body is not an object with a
    /// string `query` and (optionally) a list `history`.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| RagError::InvalidInput(format!("malformed query request: {e}")))
    }

    /// The well-formed history turns; anything else is skipped.
    pub fn history_turns(&self) -> Vec<ConversationTurn> {
        let turns: Vec<ConversationTurn> =
            self.history.iter().filter_map(ConversationTurn::from_json).collect();
        if turns.len() != self.history.len() {
            debug!(
                dropped = self.history.len() - turns.len(),
                "ignoring malformed history entries"
            );
        }
        turns
    }
}

/// A document in a query response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentPayload {
    /// The chunk id.
    pub id: String,
    /// The relevance score after reranking.
    pub score: f32,
    /// The passage text.
    pub text: String,
    /// The passage metadata.
    pub metadata: Metadata,
}

impl From<DocumentChunk> for DocumentPayload {
    fn from(chunk: DocumentChunk) -> Self {
        Self { score: chunk.relevance(), id: chunk.id, text: chunk.text, metadata: chunk.metadata }
    }
}

/// Body of a query response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    /// The generated answer.
    pub answer: String,
    /// The documents the answer was generated from, in prompt order.
    pub documents: Vec<DocumentPayload>,
}

impl From<Answer> for QueryResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.text,
            documents: answer.documents.into_inner().into_iter().map(Into::into).collect(),
        }
    }
}

impl RagPipeline {
    /// Answer a [`QueryRequest`].
    ///
    /// # Errors
    ///
    /// See [`RagPipeline::answer`].
    pub async fn handle(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let history = request.history_turns();
        let answer = self.answer(&request.query, &history).await?;
        Ok(answer.into())
    }
}
