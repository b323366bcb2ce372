//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use shantilly_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334", None, Duration::from_secs(10))?;
//! let hits = store.search("docs", &query_embedding, 5).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{PointId, SearchPointsBuilder, Value as QdrantValue};
use serde_json::{Map, Number, Value};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::vectorstore::{ScoredPoint, VectorStore};

const BACKEND: &str = "qdrant";

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// The wrapped client is cheap to share: it holds a gRPC channel and no
/// per-query state.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Connect to the Qdrant gRPC endpoint at `url`.
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .timeout(timeout)
            .build()
            .map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::vector_store(BACKEND, e.to_string())
    }
}

/// Render a point id as a string.
fn point_id_to_string(id: Option<&PointId>) -> Option<String> {
    match id?.point_id_options.as_ref()? {
        PointIdOptions::Uuid(s) => Some(s.clone()),
        PointIdOptions::Num(n) => Some(n.to_string()),
    }
}

/// Convert a Qdrant payload value into JSON.
fn to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => {
            Value::Object(s.fields.into_iter().map(|(k, v)| (k, to_json(v))).collect())
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| {
                error!(collection, error = %e, "qdrant search failed");
                Self::map_err(e)
            })?;

        let hits = response
            .result
            .into_iter()
            .map(|scored| {
                let id = point_id_to_string(scored.id.as_ref()).ok_or_else(|| {
                    RagError::vector_store(BACKEND, "search hit without a point id")
                })?;
                let payload: Map<String, Value> =
                    scored.payload.into_iter().map(|(k, v)| (k, to_json(v))).collect();
                Ok(ScoredPoint { id, score: scored.score, payload })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(collection, hit_count = hits.len(), "qdrant search completed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use qdrant_client::qdrant::{ListValue, Struct};

    use super::*;

    fn value(kind: Kind) -> QdrantValue {
        QdrantValue { kind: Some(kind) }
    }

    #[test]
    fn converts_nested_payload_values() {
        let list = value(Kind::ListValue(ListValue {
            values: vec![value(Kind::StringValue("go".into())), value(Kind::IntegerValue(2))],
        }));
        assert_eq!(to_json(list), serde_json::json!(["go", 2]));

        let obj = value(Kind::StructValue(Struct {
            fields: HashMap::from([("a".to_string(), value(Kind::BoolValue(true)))]),
        }));
        assert_eq!(to_json(obj), serde_json::json!({"a": true}));
        assert_eq!(to_json(QdrantValue { kind: None }), Value::Null);
    }

    #[test]
    fn renders_numeric_and_uuid_ids() {
        let num = PointId { point_id_options: Some(PointIdOptions::Num(42)) };
        assert_eq!(point_id_to_string(Some(&num)).as_deref(), Some("42"));
        let uuid = PointId { point_id_options: Some(PointIdOptions::Uuid("a-b".into())) };
        assert_eq!(point_id_to_string(Some(&uuid)).as_deref(), Some("a-b"));
        assert_eq!(point_id_to_string(None), None);
    }
}
