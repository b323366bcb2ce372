//! Query rewriting: condensing a conversation into a standalone search query.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::document::{ConversationTurn, Role};
use crate::generation::{GenerationClient, GenerationProvider};

/// Turns the conversation so far plus the latest question into a query
/// that can be searched without the conversation.
///
/// Rewriting cannot fail: an implementation that cannot do better returns
/// the query unchanged.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    /// Rewrite `query` in the light of `history` (oldest turn first).
    async fn rewrite(&self, history: &[ConversationTurn], query: &str) -> String;
}

/// Returns the query unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRewriter;

#[async_trait]
impl QueryRewriter for PassthroughRewriter {
    async fn rewrite(&self, _history: &[ConversationTurn], query: &str) -> String {
        query.to_string()
    }
}

const CONDENSE_INSTRUCTIONS: &str = "Rewrite the user's last question as a single standalone \
search query. Resolve pronouns and omitted subjects using the conversation. Keep the language \
of the question. Reply with the query only, without quotes or explanations.";

/// Condenses the conversation through a language model.
///
/// Falls back to the unchanged query when the history has no usable turns,
/// or when the model fails, times out, or replies with nothing.
pub struct LlmQueryRewriter {
    client: GenerationClient,
    max_turns: usize,
}

impl LlmQueryRewriter {
    /// Create a rewriter that gives the model at most `timeout` and shows it
    /// the last `max_turns` usable turns.
    pub fn new(provider: Arc<dyn GenerationProvider>, timeout: Duration, max_turns: usize) -> Self {
        Self { client: GenerationClient::new(provider, timeout), max_turns }
    }

    fn condense_prompt(turns: &[&ConversationTurn], query: &str) -> String {
        let conversation = turns
            .iter()
            .map(|turn| {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{speaker}: {}", turn.content.trim())
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{CONDENSE_INSTRUCTIONS}\n\nConversation:\n{conversation}\n\nLast question: {}\n\nStandalone query:",
            query.trim()
        )
    }
}

#[async_trait]
impl QueryRewriter for LlmQueryRewriter {
    async fn rewrite(&self, history: &[ConversationTurn], query: &str) -> String {
        let usable: Vec<&ConversationTurn> =
            history.iter().filter(|t| !t.content.trim().is_empty()).collect();
        if usable.is_empty() || self.max_turns == 0 {
            return query.to_string();
        }
        let recent = &usable[usable.len().saturating_sub(self.max_turns)..];

        match self.client.generate(&Self::condense_prompt(recent, query)).await {
            Ok(rewritten) => {
                let rewritten = rewritten.trim().trim_matches('"').trim();
                if rewritten.is_empty() {
                    return query.to_string();
                }
                debug!(original = query, rewritten, "query rewritten");
                rewritten.to_string()
            }
            Err(e) => {
                warn!(error = %e, "query rewriting failed, searching with the original query");
                query.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerationProvider;

    #[tokio::test]
    async fn passthrough_is_identity() {
        let history = vec![ConversationTurn::user("Tell me about cobra")];
        assert_eq!(PassthroughRewriter.rewrite(&history, "and flags?").await, "and flags?");
        assert_eq!(PassthroughRewriter.rewrite(&[], "What is X?").await, "What is X?");
    }

    #[tokio::test]
    async fn empty_history_skips_the_model() {
        let model = Arc::new(ScriptedGenerationProvider::replying("rewritten"));
        let rewriter = LlmQueryRewriter::new(model.clone(), Duration::from_secs(1), 6);
        let blank = vec![ConversationTurn::assistant("   ")];

        assert_eq!(rewriter.rewrite(&blank, "What is X?").await, "What is X?");
        assert!(model.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn uses_model_output_and_recent_turns_only() {
        let model = Arc::new(ScriptedGenerationProvider::replying("\"How do cobra flags work?\"\n"));
        let rewriter = LlmQueryRewriter::new(model.clone(), Duration::from_secs(1), 2);
        let history = vec![
            ConversationTurn::user("old topic"),
            ConversationTurn::user("Tell me about cobra"),
            ConversationTurn::assistant("Cobra is a CLI library."),
        ];

        assert_eq!(rewriter.rewrite(&history, "and flags?").await, "How do cobra flags work?");
        let prompts = model.prompts().await;
        assert!(!prompts[0].contains("old topic"));
        assert!(prompts[0].contains("Assistant: Cobra is a CLI library."));
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_the_query() {
        let model = Arc::new(ScriptedGenerationProvider::failing("connection refused"));
        let rewriter = LlmQueryRewriter::new(model, Duration::from_secs(1), 6);
        let history = vec![ConversationTurn::user("Tell me about cobra")];
        assert_eq!(rewriter.rewrite(&history, "and flags?").await, "and flags?");
    }
}
