//! Rendering of query results for the terminal.

use std::fmt::Write;
use std::time::Duration;

use serde::Serialize;
use shantilly_rag::{Answer, QueryResponse};

/// JSON shape of `shantilly query --format json`.
#[derive(Debug, Serialize)]
pub struct QueryOutput {
    /// The question as asked.
    pub question: String,
    /// The query actually searched, after rewriting.
    pub search_query: String,
    /// The answer and its documents.
    #[serde(flatten)]
    pub response: QueryResponse,
    /// Wall-clock time of the pipeline run.
    pub latency_ms: u128,
}

impl QueryOutput {
    /// Assemble the output for one run.
    pub fn new(question: &str, answer: Answer, elapsed: Duration) -> Self {
        Self {
            question: question.to_string(),
            search_query: answer.search_query.clone(),
            response: answer.into(),
            latency_ms: elapsed.as_millis(),
        }
    }
}

/// Human-readable rendering: the answer, numbered sources, elapsed time.
pub fn render_text(answer: &Answer, elapsed: Duration) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.text.trim_end());

    if !answer.provenance.is_empty() {
        let _ = writeln!(out, "\nSources:");
        for (source, doc) in answer.provenance.iter().zip(answer.documents.iter()) {
            let _ = write!(out, "  [{}] score={:.3} {}", source.index, doc.relevance(), source.source);
            if let Some(library) = &source.library {
                let _ = write!(out, " (library: {library})");
            }
            out.push('\n');
        }
    }

    let _ = write!(out, "\nAnswered in {:.2}s", elapsed.as_secs_f64());
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Map, json};
    use shantilly_rag::testing::{HashEmbeddingProvider, ScriptedGenerationProvider};
    use shantilly_rag::{InMemoryVectorStore, RagConfig, RagPipeline};

    use super::*;

    async fn sample_answer() -> Answer {
        let embedder = HashEmbeddingProvider::new(8);
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 8).await;
        let payload = json!({"text": "Cobra is a CLI library.", "source": "cobra/README.md", "library": "cobra"})
            .as_object()
            .cloned()
            .unwrap();
        store.insert("docs", "1", embedder.vector_for("cobra"), payload).await.unwrap();
        let mut bare = Map::new();
        bare.insert("text".into(), json!("Unrelated."));
        store.insert("docs", "2", embedder.vector_for("other"), bare).await.unwrap();

        let pipeline = RagPipeline::builder()
            .config(RagConfig::builder().collection("docs").embedding_dimensions(8).build().unwrap())
            .embedding_provider(Arc::new(embedder))
            .vector_store(Arc::new(store))
            .generation_provider(Arc::new(ScriptedGenerationProvider::replying("A CLI library [1].")))
            .build()
            .unwrap();
        pipeline.answer("cobra", &[]).await.unwrap()
    }

    #[tokio::test]
    async fn text_lists_numbered_sources() {
        let answer = sample_answer().await;
        let text = render_text(&answer, Duration::from_millis(1234));

        assert!(text.starts_with("A CLI library [1].\n"));
        assert!(text.contains("  [1] score=1.000 cobra/README.md (library: cobra)\n"));
        assert!(text.contains("  [2] score="));
        assert!(text.contains(" unknown\n"));
        assert!(text.ends_with("Answered in 1.23s"));
    }

    #[tokio::test]
    async fn json_output_flattens_the_response() {
        let answer = sample_answer().await;
        let output = QueryOutput::new("cobra", answer, Duration::from_millis(40));
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["question"], "cobra");
        assert_eq!(value["answer"], "A CLI library [1].");
        assert_eq!(value["latency_ms"], 40);
        assert_eq!(value["documents"][0]["metadata"]["library"], "cobra");
    }
}
