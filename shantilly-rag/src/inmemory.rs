//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and small-scale use cases.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::{RagError, Result};
use crate::vectorstore::{ScoredPoint, VectorStore};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Collection {
    dimensions: usize,
    /// Points in insertion order; ties in score keep this order.
    points: Vec<StoredPoint>,
}

#[derive(Debug, Clone)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use shantilly_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 768).await;
/// store.insert("docs", "1", vector, payload).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a named collection. No-op if it already exists.
    pub async fn create_collection(&self, name: &str, dimensions: usize) {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, points: Vec::new() });
    }

    /// Insert or replace a point.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the collection does not
    /// exist or the vector has the wrong dimension.
    pub async fn insert(
        &self,
        collection: &str,
        id: impl Into<String>,
        vector: Vec<f32>,
        payload: Map<String, Value>,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        if vector.len() != store.dimensions {
            return Err(RagError::vector_store(
                BACKEND,
                format!(
                    "vector has {} dimensions, collection '{collection}' expects {}",
                    vector.len(),
                    store.dimensions
                ),
            ));
        }

        let point = StoredPoint { id: id.into(), vector, payload };
        match store.points.iter_mut().find(|p| p.id == point.id) {
            Some(existing) => *existing = point,
            None => store.points.push(point),
        }
        Ok(())
    }
}

fn missing(collection: &str) -> RagError {
    RagError::vector_store(BACKEND, format!("collection '{collection}' does not exist"))
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        if vector.len() != store.dimensions {
            return Err(RagError::vector_store(
                BACKEND,
                format!(
                    "query vector has {} dimensions, collection '{collection}' expects {}",
                    vector.len(),
                    store.dimensions
                ),
            ));
        }

        let mut scored: Vec<ScoredPoint> = store
            .points
            .iter()
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: cosine_similarity(&point.vector, vector),
                payload: point.payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(text: &str) -> Map<String, Value> {
        match json!({ "text": text }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity_and_respects_limit() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await;
        store.insert("docs", "a", vec![1.0, 0.0], payload("a")).await.unwrap();
        store.insert("docs", "b", vec![0.0, 1.0], payload("b")).await.unwrap();
        store.insert("docs", "c", vec![0.7, 0.7], payload("c")).await.unwrap();

        let hits = store.search("docs", &[1.0, 0.1], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[tokio::test]
    async fn unknown_collection_is_an_error() {
        let store = InMemoryVectorStore::new();
        assert!(store.search("nope", &[1.0], 3).await.is_err());
    }

    #[tokio::test]
    async fn insert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 3).await;
        assert!(store.insert("docs", "a", vec![1.0], payload("a")).await.is_err());
    }
}
