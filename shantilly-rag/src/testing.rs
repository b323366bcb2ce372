//! Test doubles for the provider traits.
//!
//! These are deterministic, offline stand-ins for the embedding provider,
//! the language model, and the vector store. They are public so that
//! downstream crates (the CLI, an HTTP layer) can test against the same
//! contracts without a running Ollama or Qdrant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::embedding::{EmbedTask, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::vectorstore::{ScoredPoint, VectorStore};

/// Deterministic embeddings derived from the bytes of the input.
///
/// Identical texts always map to identical vectors, so a document inserted
/// with this provider is its own nearest neighbour when queried verbatim.
/// The task is ignored.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider producing vectors of `dimensions`.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Embed synchronously; handy when seeding an in-memory store.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        (0..self.dimensions)
            .map(|i| {
                for byte in text.bytes().chain((i as u64).to_le_bytes()) {
                    state ^= u64::from(byte);
                    state = state.wrapping_mul(0x0100_0000_01b3);
                }
                ((state >> 40) as f32 / (1u64 << 24) as f32) - 0.5
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed_batch(&self, texts: &[&str], _task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Returns the same vector for every input, optionally after a delay.
///
/// Records the task of every call so tests can check that queries are
/// embedded with [`EmbedTask::Query`].
#[derive(Debug)]
pub struct FixedEmbeddingProvider {
    vector: Vec<f32>,
    delay: Option<Duration>,
    tasks: Mutex<Vec<EmbedTask>>,
}

impl FixedEmbeddingProvider {
    /// Create a provider returning `vector` for any input.
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector, delay: None, tasks: Mutex::new(Vec::new()) }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The tasks of every batch embedded so far.
    pub async fn tasks(&self) -> Vec<EmbedTask> {
        self.tasks.lock().await.clone()
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbeddingProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn embed_batch(&self, texts: &[&str], task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        self.tasks.lock().await.push(task);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Fail(String),
}

/// A language model double that replies with a fixed script and records
/// every prompt it receives.
#[derive(Debug)]
pub struct ScriptedGenerationProvider {
    script: Script,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerationProvider {
    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self { script: Script::Reply(text.into()), delay: None, prompts: Mutex::new(Vec::new()) }
    }

    /// Always fail with a [`RagError::GenerationError`] carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { script: Script::Fail(message.into()), delay: None, prompts: Mutex::new(Vec::new()) }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, in order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerationProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().await.push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(message) => Err(RagError::generation("scripted", message.clone())),
        }
    }
}

/// Wraps a [`VectorStore`] and counts searches.
pub struct CountingVectorStore {
    inner: Arc<dyn VectorStore>,
    searches: AtomicUsize,
}

impl CountingVectorStore {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn VectorStore>) -> Self {
        Self { inner, searches: AtomicUsize::new(0) }
    }

    /// Number of searches issued so far.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for CountingVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(collection, vector, limit).await
    }
}
