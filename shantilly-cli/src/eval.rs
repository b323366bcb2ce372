//! LLM-as-judge evaluation over a question/answer dataset.
//!
//! The dataset is JSON Lines, one `{"question": ..., "answer": ...}` per
//! line. Each question is answered by the pipeline, then a judge model
//! compares the pipeline's answer against the reference and replies with a
//! strict JSON verdict.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shantilly_rag::{DocumentPayload, GenerationClient, QueryRequest, QueryResponse, RagPipeline};
use tracing::{info, warn};

/// Default dataset location, relative to the working directory.
pub const DEFAULT_DATASET: &str = "tests/rag/qa_dataset.jsonl";

/// Default results location, relative to the working directory.
pub const DEFAULT_OUTPUT: &str = "tests/rag/eval_results.jsonl";

const JUDGE_INSTRUCTIONS: &str = "You grade answers produced by a retrieval-augmented \
question answering system. You receive the user's question, a reference answer, and the \
system's answer. Decide whether the system's answer is acceptable given the question and the \
reference. Count an answer as correct when it covers the essential points, even if worded \
differently. Reply with strict JSON only, in this format: \
{\"verdict\": \"correct\" or \"incorrect\", \"reason\": \"short explanation\"}.";

/// One dataset entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalItem {
    /// The question to ask.
    pub question: String,
    /// The reference answer.
    pub answer: String,
}

/// Parse a JSON Lines dataset. Blank lines are skipped.
pub fn parse_dataset(contents: &str) -> Result<Vec<EvalItem>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("Invalid dataset entry on line {}", i + 1))
        })
        .collect()
}

/// Read and parse a dataset file.
pub fn load_dataset(path: &Path) -> Result<Vec<EvalItem>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Q&A dataset not found at {}", path.display()))?;
    parse_dataset(&contents)
}

/// The judge's decision on one answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    /// `"correct"` or `"incorrect"`.
    pub verdict: String,
    /// The judge's explanation.
    #[serde(default)]
    pub reason: String,
}

impl Verdict {
    /// Parse the judge's reply.
    ///
    /// Takes the outermost `{...}` so that code fences or a stray sentence
    /// around the object do not matter. Anything that is not a JSON object
    /// with a string `verdict` counts as incorrect.
    pub fn parse(reply: &str) -> Self {
        let parsed = match (reply.find('{'), reply.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&reply[start..=end]).ok(),
            _ => None,
        };
        parsed.unwrap_or_else(|| Self {
            verdict: "incorrect".to_string(),
            reason: "Could not interpret the judge's output.".to_string(),
        })
    }

    /// Whether the judge accepted the answer.
    pub fn is_correct(&self) -> bool {
        self.verdict.trim().eq_ignore_ascii_case("correct")
    }
}

/// The judge prompt for one answer.
pub fn judge_prompt(question: &str, reference: &str, answer: &str) -> String {
    format!(
        "{JUDGE_INSTRUCTIONS}\n\nUser question:\n{}\n\nReference answer:\n{}\n\nSystem answer:\n{}\n\nNow reply with the JSON only.",
        question.trim(),
        reference.trim(),
        answer.trim()
    )
}

/// One line of the results file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalResult {
    /// The question asked.
    pub question: String,
    /// The dataset's reference answer.
    pub reference_answer: String,
    /// The pipeline's answer.
    pub model_answer: String,
    /// The judge's decision.
    pub judge_verdict: Verdict,
    /// The documents the answer was generated from.
    pub documents: Vec<DocumentPayload>,
}

/// Totals over a dataset.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct EvalReport {
    /// Per-question results, in dataset order.
    #[serde(skip)]
    pub results: Vec<EvalResult>,
    /// Number of questions.
    pub total: usize,
    /// Number judged correct.
    pub correct: usize,
}

impl EvalReport {
    /// Fraction of questions judged correct; `0.0` for an empty dataset.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.correct as f64 / self.total as f64 }
    }

    /// Write one JSON result per line to `path`, creating parent directories.
    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for result in &self.results {
            serde_json::to_writer(&mut writer, result)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Runs a dataset through a pipeline and a judge.
pub struct Evaluator<'a> {
    pipeline: &'a RagPipeline,
    judge: GenerationClient,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator grading `pipeline` with `judge`.
    pub fn new(pipeline: &'a RagPipeline, judge: GenerationClient) -> Self {
        Self { pipeline, judge }
    }

    /// Answer and grade one item.
    ///
    /// A pipeline failure aborts; a judge failure counts as incorrect.
    pub async fn evaluate_item(&self, item: &EvalItem) -> Result<EvalResult> {
        let QueryResponse { answer, documents } = self
            .pipeline
            .handle(&QueryRequest::new(&item.question))
            .await
            .with_context(|| format!("Pipeline failed on question: {}", item.question))?;

        let prompt = judge_prompt(&item.question, &item.answer, &answer);
        let verdict = match self.judge.generate(&prompt).await {
            Ok(reply) => Verdict::parse(&reply),
            Err(e) => {
                warn!(error = %e, judge = self.judge.provider_name(), "judge call failed");
                Verdict { verdict: "incorrect".to_string(), reason: format!("Judge failed: {e}") }
            }
        };

        Ok(EvalResult {
            question: item.question.clone(),
            reference_answer: item.answer.clone(),
            model_answer: answer,
            judge_verdict: verdict,
            documents,
        })
    }

    /// Evaluate every item in order.
    pub async fn run(&self, items: &[EvalItem]) -> Result<EvalReport> {
        let mut report = EvalReport::default();
        for (i, item) in items.iter().enumerate() {
            let result = self.evaluate_item(item).await?;
            report.total += 1;
            if result.judge_verdict.is_correct() {
                report.correct += 1;
            }
            info!(
                question = i + 1,
                verdict = %result.judge_verdict.verdict,
                reason = %result.judge_verdict.reason,
                "graded"
            );
            report.results.push(result);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use shantilly_rag::testing::{HashEmbeddingProvider, ScriptedGenerationProvider};
    use shantilly_rag::{InMemoryVectorStore, RagConfig};

    use super::*;

    #[test]
    fn dataset_skips_blank_lines_and_reports_bad_ones() {
        let items = parse_dataset(
            "{\"question\": \"What is X?\", \"answer\": \"A thing.\"}\n\n   \n{\"question\": \"Y?\", \"answer\": \"No.\"}\n",
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].question, "Y?");

        let err = parse_dataset("{\"question\": \"ok\", \"answer\": \"ok\"}\n{\"question\": 1}\n")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn verdict_parsing_tolerates_fences_and_falls_back() {
        let fenced = "```json\n{\"verdict\": \"correct\", \"reason\": \"covers it\"}\n```";
        assert!(Verdict::parse(fenced).is_correct());

        for reply in ["I think it's correct", "[\"correct\"]", "{\"verdict\": 1}", ""] {
            let verdict = Verdict::parse(reply);
            assert!(!verdict.is_correct(), "{reply}");
            assert_eq!(verdict.verdict, "incorrect");
        }
    }

    #[test]
    fn judge_prompt_carries_all_three_texts() {
        let prompt = judge_prompt(" What is X? ", "A thing.", "X is a thing.\n");
        assert!(prompt.contains("User question:\nWhat is X?\n"));
        assert!(prompt.contains("Reference answer:\nA thing.\n"));
        assert!(prompt.contains("System answer:\nX is a thing.\n"));
        assert!(prompt.ends_with("Now reply with the JSON only."));
    }

    async fn pipeline() -> RagPipeline {
        let embedder = HashEmbeddingProvider::new(8);
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 8).await;
        let payload = json!({"text": "X is a thing.", "source": "x.md"}).as_object().cloned().unwrap();
        store.insert("docs", "1", embedder.vector_for("X"), payload).await.unwrap();

        RagPipeline::builder()
            .config(RagConfig::builder().collection("docs").embedding_dimensions(8).build().unwrap())
            .embedding_provider(Arc::new(embedder))
            .vector_store(Arc::new(store))
            .generation_provider(Arc::new(ScriptedGenerationProvider::replying("X is a thing.")))
            .build()
            .unwrap()
    }

    fn items() -> Vec<EvalItem> {
        vec![
            EvalItem { question: "What is X?".into(), answer: "A thing.".into() },
            EvalItem { question: "Is X big?".into(), answer: "No.".into() },
        ]
    }

    #[tokio::test]
    async fn run_counts_correct_verdicts_and_writes_jsonl() {
        let pipeline = pipeline().await;
        let judge = Arc::new(ScriptedGenerationProvider::replying(
            "{\"verdict\": \"correct\", \"reason\": \"matches\"}",
        ));
        let evaluator = Evaluator::new(&pipeline, GenerationClient::new(judge.clone(), Duration::from_secs(5)));

        let report = evaluator.run(&items()).await.unwrap();

        assert_eq!((report.total, report.correct), (2, 2));
        assert!((report.accuracy() - 1.0).abs() < f64::EPSILON);
        let prompts = judge.prompts().await;
        assert!(prompts[0].contains("Reference answer:\nA thing."));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("eval_results.jsonl");
        report.write_jsonl(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            written.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["model_answer"], "X is a thing.");
        assert_eq!(lines[0]["judge_verdict"]["verdict"], "correct");
        assert_eq!(lines[0]["documents"][0]["metadata"]["source"], "x.md");
    }

    #[tokio::test]
    async fn failing_judge_counts_as_incorrect() {
        let pipeline = pipeline().await;
        let judge = Arc::new(ScriptedGenerationProvider::failing("connection refused"));
        let evaluator = Evaluator::new(&pipeline, GenerationClient::new(judge, Duration::from_secs(5)));

        let report = evaluator.run(&items()).await.unwrap();

        assert_eq!((report.total, report.correct), (2, 0));
        assert!(report.results[0].judge_verdict.reason.contains("connection refused"));
    }

    #[test]
    fn empty_report_has_zero_accuracy() {
        assert_eq!(EvalReport::default().accuracy(), 0.0);
    }
}
