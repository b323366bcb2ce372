//! First-stage retrieval: embed the query, search, validate payloads.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::document::{DocumentChunk, Metadata, MetadataValue};
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result};
use crate::vectorstore::{ScoredPoint, TEXT_FIELD, VectorStore};

/// Fetches candidate chunks for a query from one collection.
#[derive(Clone)]
pub struct Retriever {
    embedder: EmbeddingClient,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl Retriever {
    /// Create a retriever searching `collection`.
    pub fn new(
        embedder: EmbeddingClient,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self { embedder, store, collection: collection.into() }
    }

    /// The collection this retriever searches.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Return up to `top_k` chunks in the store's similarity order.
    ///
    /// Fewer matches yield fewer chunks; none yields an empty `Vec`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for a blank query or `top_k == 0`.
    /// - Embedding errors (including dimension mismatch and timeouts)
    ///   unchanged; the store is not searched in that case.
    /// - [`RagError::VectorStoreError`] if the search fails or a hit has no
    ///   string `text` field.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<DocumentChunk>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be greater than zero".to_string()));
        }

        let vector = self.embedder.embed_query(query).await?;

        let hits = self.store.search(&self.collection, &vector, top_k).await.inspect_err(|e| {
            error!(collection = %self.collection, error = %e, "vector store search failed");
        })?;

        let chunks = hits.into_iter().map(chunk_from_point).collect::<Result<Vec<_>>>()?;
        debug!(collection = %self.collection, top_k, result_count = chunks.len(), "retrieved");
        Ok(chunks)
    }
}

/// Validate a raw hit: `text` must be a string, everything else becomes
/// metadata. Nested objects are not representable and are dropped.
pub fn chunk_from_point(point: ScoredPoint) -> Result<DocumentChunk> {
    let ScoredPoint { id, score, mut payload } = point;

    let text = match payload.remove(TEXT_FIELD) {
        Some(serde_json::Value::String(text)) => text,
        Some(_) => {
            return Err(RagError::vector_store(
                "payload",
                format!("point '{id}' has a non-string '{TEXT_FIELD}' field"),
            ));
        }
        None => {
            return Err(RagError::vector_store(
                "payload",
                format!("point '{id}' has no '{TEXT_FIELD}' field"),
            ));
        }
    };

    let mut metadata = Metadata::new();
    for (key, value) in payload {
        match MetadataValue::from_json(value) {
            Some(value) => {
                metadata.insert(key, value);
            }
            None => warn!(point = %id, field = %key, "dropping nested metadata field"),
        }
    }

    Ok(DocumentChunk { id, text, metadata, score, rerank_score: None })
}
