//! Prompt assembly: instructions, numbered context blocks, and the question.
//!
//! ```text
//! <instructions>
//!
//! Context:
//! [1] source: github:golang/go:/doc/effective_go.md (library: go)
//! <passage text>
//!
//! === end of document [1] ===
//!
//! [2] source: unknown
//! <passage text>
//!
//! Question: <query>
//!
//! Answer:
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::RankedSet;

const DEFAULT_INSTRUCTIONS: &str = "You are a technical assistant answering questions about \
a documentation knowledge base. Answer only from the context below. If the context does not \
contain enough information to answer, say so plainly instead of guessing. Cite the sources you \
used by their [number]. Answer in the same language as the question, concisely and in a neutral \
tone.";

const DEFAULT_NO_CONTEXT_MARKER: &str = "[NO RELEVANT DOCUMENTS FOUND]";

const DEFAULT_SEPARATOR: &str = "\n\n=== end of document [{n}] ===\n\n";

/// Replaced in the separator by the number of the block it closes.
const BLOCK_NUMBER: &str = "{n}";

/// The fixed wording around the context block. Every field can be
/// overridden from configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptTemplate {
    /// Scope, honesty, language, and tone instructions placed first.
    pub instructions: String,
    /// Placed in the context section when no documents were retrieved.
    pub no_context_marker: String,
    /// Placed between two context blocks. `{n}` is replaced by the number
    /// of the block it closes, so a passage cannot contain a separator
    /// that matches its position by accident.
    pub separator: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            no_context_marker: DEFAULT_NO_CONTEXT_MARKER.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// A fully assembled generation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prompt(String);

impl Prompt {
    /// The prompt text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the prompt, returning the text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PromptTemplate {
    /// The separator closing block `n` (1-based).
    pub fn separator_after(&self, n: usize) -> String {
        self.separator.replace(BLOCK_NUMBER, &n.to_string())
    }

    /// Assemble a prompt for `query` from `docs`.
    ///
    /// Pure and deterministic: identical inputs give byte-identical output.
    pub fn build_prompt(&self, query: &str, docs: &RankedSet) -> Prompt {
        let context = if docs.is_empty() {
            self.no_context_marker.clone()
        } else {
            let mut context = String::new();
            for (i, doc) in docs.iter().enumerate() {
                if i > 0 {
                    context.push_str(&self.separator_after(i));
                }
                context.push_str(&format!("[{}] source: {}", i + 1, doc.source_label()));
                if let Some(library) = doc.library() {
                    context.push_str(&format!(" (library: {library})"));
                }
                context.push('\n');
                context.push_str(doc.text.trim_end());
            }
            context
        };

        Prompt(format!(
            "{}\n\nContext:\n{context}\n\nQuestion: {}\n\nAnswer:",
            self.instructions.trim_end(),
            query.trim()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentChunk, Metadata, MetadataValue};

    fn doc(id: &str, text: &str, source: Option<&str>) -> DocumentChunk {
        let mut metadata = Metadata::new();
        if let Some(source) = source {
            metadata.insert("source".into(), MetadataValue::String(source.into()));
        }
        DocumentChunk { id: id.into(), text: text.into(), metadata, score: 0.9, rerank_score: None }
    }

    #[test]
    fn empty_context_carries_the_marker() {
        let template = PromptTemplate::default();
        let prompt = template.build_prompt("What is X?", &RankedSet::empty());
        assert!(prompt.as_str().contains(DEFAULT_NO_CONTEXT_MARKER));
        assert!(prompt.as_str().ends_with("Question: What is X?\n\nAnswer:"));
    }

    #[test]
    fn blocks_are_numbered_attributed_and_separated() {
        let template = PromptTemplate::default();
        let docs = RankedSet::from_ordered(vec![
            doc("1", "Goroutines are cheap.", Some("github:golang/go:/doc/faq.md")),
            doc("2", "Channels synchronize.", None),
        ]);
        let prompt = template.build_prompt("How do goroutines work?", &docs);
        let text = prompt.as_str();

        assert!(text.contains("[1] source: github:golang/go:/doc/faq.md\nGoroutines are cheap."));
        assert!(text.contains("[2] source: unknown\nChannels synchronize."));
        assert_eq!(text.matches("=== end of document [").count(), 1);
        assert!(text.contains("Goroutines are cheap.\n\n=== end of document [1] ===\n\n[2]"));
        assert!(text.find("[1]").unwrap() < text.find("[2]").unwrap());
        assert!(!text.contains(DEFAULT_NO_CONTEXT_MARKER));
    }

    #[test]
    fn markdown_rules_in_passages_are_not_separators() {
        let template = PromptTemplate::default();
        let one = RankedSet::from_ordered(vec![doc("1", "## Install\n\n-----\n\n## Usage", None)]);
        let text = template.build_prompt("q", &one).into_string();
        assert_eq!(text.matches("=== end of document [").count(), 0);
        assert!(text.contains("## Install\n\n-----\n\n## Usage"));

        let three = RankedSet::from_ordered(vec![
            doc("1", "a\n\n-----\n\nb", None),
            doc("2", "***", None),
            doc("3", "c", None),
        ]);
        let text = template.build_prompt("q", &three).into_string();
        assert_eq!(text.matches("=== end of document [").count(), 2);
        assert_eq!(text.matches(&template.separator_after(2)).count(), 1);
    }

    #[test]
    fn library_is_included_when_present() {
        let mut d = doc("1", "text", Some("src"));
        d.metadata.insert("library".into(), MetadataValue::String("cobra".into()));
        let prompt = PromptTemplate::default().build_prompt("q", &RankedSet::from_ordered(vec![d]));
        assert!(prompt.as_str().contains("[1] source: src (library: cobra)"));
    }

    #[test]
    fn overridden_wording_is_used() {
        let template = PromptTemplate {
            instructions: "Responda em português.".into(),
            no_context_marker: "SEM CONTEXTO".into(),
            ..Default::default()
        };
        let prompt = template.build_prompt("O que é X?", &RankedSet::empty());
        assert!(prompt.as_str().starts_with("Responda em português."));
        assert!(prompt.as_str().contains("SEM CONTEXTO"));
    }
}
