//! Vector store trait for nearest-neighbour search over indexed chunks.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Payload key holding the passage text. Every other key is metadata.
pub const TEXT_FIELD: &str = "text";

/// A raw search hit, before its payload is validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    /// The point id rendered as a string (numeric ids in decimal).
    pub id: String,
    /// The similarity score reported by the store.
    pub score: f32,
    /// The flat payload stored with the point.
    pub payload: Map<String, Value>,
}

/// A read-only handle to a nearest-neighbour index.
///
/// Implementations hold no per-query state and are shared across
/// concurrent queries. Indexing happens elsewhere; this trait only searches.
///
/// # Example
///
/// ```rust,ignore
/// use shantilly_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// let hits = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Search `collection` for the `limit` points most similar to `vector`.
    ///
    /// Returns hits in the store's similarity order (descending score).
    /// An empty result is not an error.
    async fn search(&self, collection: &str, vector: &[f32], limit: usize)
    -> Result<Vec<ScoredPoint>>;
}
