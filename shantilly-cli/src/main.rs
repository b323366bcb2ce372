//! # shantilly
//!
//! Ask questions against an indexed documentation corpus, grade the
//! pipeline against a Q&A dataset, or inspect the effective configuration.
//!
//! ```bash
//! shantilly query "How do I add flags to a cobra command?"
//! shantilly query "and persistent ones?" --history turns.json --format json
//! shantilly eval --dataset tests/rag/qa_dataset.jsonl --judge-model phi3:medium
//! shantilly config
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shantilly_cli::eval::{self, Evaluator};
use shantilly_cli::output::{self, QueryOutput};
use shantilly_cli::setup;
use shantilly_rag::{GenerationClient, QueryRequest};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shantilly")]
#[command(about = "Retrieval-augmented answers over your documentation")]
#[command(version)]
struct Cli {
    /// Path to config file (default: config/retrieval.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question
    Query {
        /// The question
        question: String,

        /// JSON file with earlier turns: [{"role": "user", "content": "..."}, ...]
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Grade the pipeline against a Q&A dataset with an LLM judge
    Eval {
        /// JSON Lines dataset of {"question", "answer"} entries
        #[arg(long, default_value = eval::DEFAULT_DATASET)]
        dataset: PathBuf,

        /// Where to write per-question results
        #[arg(long, default_value = eval::DEFAULT_OUTPUT)]
        output: PathBuf,

        /// Judge model (default: $OLLAMA_JUDGE_MODEL, then the chat model)
        #[arg(long)]
        judge_model: Option<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_history(path: &Path) -> Result<Vec<Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("History in {} must be a JSON array", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = setup::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Query { question, history } => {
            let history = match history {
                Some(path) => read_history(&path)?,
                None => Vec::new(),
            };
            let request = QueryRequest { query: question, history };
            let pipeline = setup::build_pipeline(&config)?;

            let started = Instant::now();
            let answer = pipeline.answer(&request.query, &request.history_turns()).await?;
            let elapsed = started.elapsed();

            match cli.format {
                OutputFormat::Text => println!("{}", output::render_text(&answer, elapsed)),
                OutputFormat::Json => {
                    let out = QueryOutput::new(&request.query, answer, elapsed);
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        }

        Commands::Eval { dataset, output, judge_model } => {
            let items = eval::load_dataset(&dataset)?;
            info!(count = items.len(), dataset = %dataset.display(), "loaded dataset");

            let mut judge_config = config.generation.clone();
            if let Some(model) =
                judge_model.or_else(|| std::env::var("OLLAMA_JUDGE_MODEL").ok())
            {
                judge_config.model = model;
            }
            info!(judge_model = %judge_config.model, "judge configured");
            let judge = GenerationClient::new(
                setup::generation_provider(&judge_config)?,
                judge_config.timeout(),
            );

            let pipeline = setup::build_pipeline(&config)?;
            let report = Evaluator::new(&pipeline, judge).run(&items).await?;
            report.write_jsonl(&output)?;

            match cli.format {
                OutputFormat::Text => {
                    for (i, result) in report.results.iter().enumerate() {
                        println!(
                            "[Q{}] {}: {} - {}",
                            i + 1,
                            result.question,
                            result.judge_verdict.verdict,
                            result.judge_verdict.reason
                        );
                    }
                    println!();
                    println!("Total questions: {}", report.total);
                    println!("Judged correct: {}", report.correct);
                    println!("Accuracy: {:.2}%", report.accuracy() * 100.0);
                    println!("Results written to {}", output.display());
                }
                OutputFormat::Json => {
                    let summary = serde_json::json!({
                        "total": report.total,
                        "correct": report.correct,
                        "accuracy": report.accuracy(),
                        "output": output.display().to_string(),
                    });
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
            }
        }

        Commands::Config => print!("{}", setup::render_config(&config)?),
    }

    Ok(())
}
