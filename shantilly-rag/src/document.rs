//! Data types for conversation history, retrieved chunks, and answers.

use std::collections::{BTreeMap, HashSet};
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label used when a chunk carries neither a `source` nor a `path` field.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// The author of a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message written by the end user.
    User,
    /// A message produced by the assistant.
    Assistant,
}

/// One message of a conversation. A `&[ConversationTurn]` in chronological
/// order is the history handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    /// Who wrote the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ConversationTurn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    /// Convert an untyped JSON history entry into a turn.
    ///
    /// Returns `None` for anything that is not an object with a
    /// `"user"`/`"assistant"` role and a string content.
    pub fn from_json(value: &Value) -> Option<Self> {
        let role = match value.get("role")?.as_str()? {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => return None,
        };
        let content = value.get("content")?.as_str()?.to_string();
        Some(Self { role, content })
    }
}

/// A single metadata value attached to a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// An explicit null (e.g. a chunk with no originating library).
    Null,
    /// A boolean flag.
    Bool(bool),
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// A list of strings, such as tags.
    List(Vec<String>),
}

impl MetadataValue {
    /// Convert a JSON value, rejecting nested objects and nested lists.
    ///
    /// Scalars inside a list are rendered as strings.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::String(s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Bool(b) => Some(b.to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(Self::List),
            Value::Object(_) => None,
        }
    }

    /// Return the string payload if this is a non-blank string.
    pub fn as_non_blank_str(&self) -> Option<&str> {
        match self {
            Self::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Chunk metadata, ordered by key so serialized output is deterministic.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A passage retrieved from the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// Identifier of the point in the vector store.
    pub id: String,
    /// The passage text.
    pub text: String,
    /// Every payload field except `text`.
    pub metadata: Metadata,
    /// Similarity score assigned by the vector store (higher is more relevant).
    pub score: f32,
    /// Score assigned by the reranker's scorer, when reranking ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl DocumentChunk {
    /// Resolve the label used to attribute this chunk.
    ///
    /// Prefers the `source` field, then `path`, then [`UNKNOWN_SOURCE`].
    pub fn source_label(&self) -> &str {
        ["source", "path"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(MetadataValue::as_non_blank_str))
            .unwrap_or(UNKNOWN_SOURCE)
    }

    /// The score the chunk is ranked by: the rerank score when present,
    /// otherwise the retrieval score.
    pub fn relevance(&self) -> f32 {
        self.rerank_score.unwrap_or(self.score)
    }

    /// The originating library, when the indexer recorded one.
    pub fn library(&self) -> Option<&str> {
        self.metadata.get("library").and_then(MetadataValue::as_non_blank_str)
    }
}

/// An ordered, duplicate-free sequence of chunks, as produced by the reranker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RankedSet(Vec<DocumentChunk>);

impl RankedSet {
    /// Build a set from chunks that are already in their final order.
    ///
    /// Later chunks whose id was already seen are dropped.
    pub fn from_ordered(chunks: Vec<DocumentChunk>) -> Self {
        let mut seen = HashSet::with_capacity(chunks.len());
        let chunks = chunks.into_iter().filter(|c| seen.insert(c.id.clone())).collect();
        Self(chunks)
    }

    /// An empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Consume the set, returning the chunks.
    pub fn into_inner(self) -> Vec<DocumentChunk> {
        self.0
    }
}

impl Deref for RankedSet {
    type Target = [DocumentChunk];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a RankedSet {
    type Item = &'a DocumentChunk;
    type IntoIter = std::slice::Iter<'a, DocumentChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Attribution of one chunk that informed an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceAttribution {
    /// 1-based position of the chunk in the prompt context.
    pub index: usize,
    /// The chunk id.
    pub id: String,
    /// The resolved source label, as shown to the model.
    pub source: String,
    /// The originating library, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

/// The result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The generated text.
    pub text: String,
    /// The query actually used for retrieval (after rewriting).
    pub search_query: String,
    /// The chunks placed in the prompt, in prompt order.
    pub documents: RankedSet,
    /// One attribution per entry of `documents`.
    pub provenance: Vec<SourceAttribution>,
}

impl Answer {
    pub(crate) fn new(text: String, search_query: String, documents: RankedSet) -> Self {
        let provenance = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| SourceAttribution {
                index: i + 1,
                id: doc.id.clone(),
                source: doc.source_label().to_string(),
                library: doc.library().map(str::to_string),
            })
            .collect();
        Self { text, search_query, documents, provenance }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn chunk(id: &str, metadata: Metadata) -> DocumentChunk {
        DocumentChunk { id: id.into(), text: "t".into(), metadata, score: 0.5, rerank_score: None }
    }

    #[test]
    fn source_label_prefers_source_then_path() {
        let mut metadata = Metadata::new();
        metadata.insert("path".into(), MetadataValue::String("github/x/y.md".into()));
        assert_eq!(chunk("1", metadata.clone()).source_label(), "github/x/y.md");

        metadata.insert("source".into(), MetadataValue::String("github:x/y:/y.md".into()));
        assert_eq!(chunk("1", metadata).source_label(), "github:x/y:/y.md");

        let mut blank = Metadata::new();
        blank.insert("source".into(), MetadataValue::String("  ".into()));
        assert_eq!(chunk("1", blank).source_label(), UNKNOWN_SOURCE);
    }

    #[test]
    fn ranked_set_drops_duplicate_ids() {
        let set = RankedSet::from_ordered(vec![
            chunk("a", Metadata::new()),
            chunk("b", Metadata::new()),
            chunk("a", Metadata::new()),
        ]);
        let ids: Vec<_> = set.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn turn_from_json_rejects_ill_typed_entries() {
        assert_eq!(
            ConversationTurn::from_json(&json!({"role": "user", "content": "hi"})),
            Some(ConversationTurn::user("hi"))
        );
        assert_eq!(ConversationTurn::from_json(&json!({"role": "system", "content": "x"})), None);
        assert_eq!(ConversationTurn::from_json(&json!({"role": "user", "content": 3})), None);
        assert_eq!(ConversationTurn::from_json(&json!("user: hi")), None);
    }

    #[test]
    fn metadata_value_conversion() {
        assert_eq!(MetadataValue::from_json(json!(null)), Some(MetadataValue::Null));
        assert_eq!(MetadataValue::from_json(json!(3)), Some(MetadataValue::Integer(3)));
        assert_eq!(
            MetadataValue::from_json(json!(["go", 1])),
            Some(MetadataValue::List(vec!["go".into(), "1".into()]))
        );
        assert_eq!(MetadataValue::from_json(json!({"a": 1})), None);
        assert_eq!(MetadataValue::from_json(json!([["nested"]])), None);
    }
}
