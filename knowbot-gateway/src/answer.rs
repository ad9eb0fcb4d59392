//! Bounded-length answer synthesis.

use std::sync::Arc;

use knowbot_knowledge::{NO_MATCHING_KNOWLEDGE, cap_chars};
use tracing::warn;

use crate::providers::ChatProvider;

/// Answer given when retrieval found nothing.
pub const NO_KNOWLEDGE_ANSWER: &str = "Sorry, no relevant knowledge was found.";

/// Answer given when retrieval itself failed.
pub const DEGRADED_ANSWER: &str =
    "Sorry, the knowledge base is currently unavailable. Please try again later.";

/// Upper bound on answer length in code points; configured values above it are clamped.
pub const DEFAULT_MAX_ANSWER_CHARS: usize = 200;

fn system_instruction(max_chars: usize) -> String {
    format!(
        "You answer questions for a team knowledge base.
Rules:
1. Use only the knowledge base context provided by the user message.
2. Answer in at most {max_chars} characters.
3. If the context holds nothing relevant, reply exactly: \"{NO_KNOWLEDGE_ANSWER}\""
    )
}

/// Turns a question and its context block into a capped answer.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    provider: Option<Arc<dyn ChatProvider>>,
    max_chars: usize,
}

impl std::fmt::Debug for AnswerSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerSynthesizer")
            .field("provider", &self.provider.as_ref().map(|p| p.model()))
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

impl AnswerSynthesizer {
    pub fn new(provider: Option<Arc<dyn ChatProvider>>, max_chars: usize) -> Self {
        if max_chars > DEFAULT_MAX_ANSWER_CHARS {
            warn!(
                configured = max_chars,
                "answer length above {DEFAULT_MAX_ANSWER_CHARS} characters, clamping"
            );
        }
        Self {
            provider,
            max_chars: max_chars.min(DEFAULT_MAX_ANSWER_CHARS),
        }
    }

    /// Local templates only.
    pub fn local(max_chars: usize) -> Self {
        Self::new(None, max_chars)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn has_remote(&self) -> bool {
        self.provider.is_some()
    }

    /// Never fails; provider errors degrade to the local template.
    pub async fn synthesize(&self, question: &str, context: &str) -> String {
        let Some(provider) = &self.provider else {
            return cap_chars(&local_answer(question, context), self.max_chars);
        };

        let user = format!("Question: {question}\n\nKnowledge base:\n{context}");
        match provider
            .complete(&system_instruction(self.max_chars), &user)
            .await
        {
            Ok(answer) => cap_chars(answer.trim(), self.max_chars),
            Err(err) => {
                warn!(
                    provider = provider.name(),
                    model = provider.model(),
                    error = %err,
                    "answer provider failed, using local template"
                );
                cap_chars(&local_answer(question, context), self.max_chars)
            }
        }
    }
}

fn local_answer(question: &str, context: &str) -> String {
    if context.trim().is_empty() || context == NO_MATCHING_KNOWLEDGE {
        return NO_KNOWLEDGE_ANSWER.to_string();
    }
    format!("Regarding \"{question}\", here is what the knowledge base says: {context}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;

    struct FixedProvider(Result<String, u16>);

    #[async_trait::async_trait]
    impl ChatProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-model"
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
            self.0.clone().map_err(|status| ProviderError::ApiError {
                status,
                message: "boom".to_string(),
            })
        }
    }

    fn with_provider(result: Result<String, u16>) -> AnswerSynthesizer {
        AnswerSynthesizer::new(Some(Arc::new(FixedProvider(result))), DEFAULT_MAX_ANSWER_CHARS)
    }

    #[tokio::test]
    async fn no_knowledge_gives_fixed_sentence() {
        let synth = AnswerSynthesizer::local(DEFAULT_MAX_ANSWER_CHARS);
        let answer = synth.synthesize("What is our refund policy?", NO_MATCHING_KNOWLEDGE).await;
        assert_eq!(answer, NO_KNOWLEDGE_ANSWER);
    }

    #[tokio::test]
    async fn local_path_is_capped() {
        let synth = AnswerSynthesizer::local(DEFAULT_MAX_ANSWER_CHARS);
        let context = "policy ".repeat(100);
        let answer = synth.synthesize("refunds?", &context).await;
        assert_eq!(answer.chars().count(), 200);
        assert!(answer.ends_with("..."));
        assert!(answer.starts_with("Regarding \"refunds?\""));
    }

    #[tokio::test]
    async fn remote_success_is_capped() {
        let synth = with_provider(Ok("y".repeat(500)));
        let answer = synth.synthesize("q", "ctx").await;
        assert_eq!(answer.chars().count(), 200);
        assert_eq!(answer, format!("{}...", "y".repeat(197)));
    }

    #[tokio::test]
    async fn remote_short_answer_is_untouched() {
        let synth = with_provider(Ok("Refunds take 14 days.".to_string()));
        assert_eq!(synth.synthesize("q", "ctx").await, "Refunds take 14 days.");
    }

    #[tokio::test]
    async fn remote_failure_falls_back_and_is_capped() {
        let synth = with_provider(Err(500));
        let context = "z".repeat(400);
        let answer = synth.synthesize("q", &context).await;
        assert_eq!(answer.chars().count(), 200);
        assert!(answer.ends_with("..."));

        let answer = synth.synthesize("q", NO_MATCHING_KNOWLEDGE).await;
        assert_eq!(answer, NO_KNOWLEDGE_ANSWER);
    }

    #[tokio::test]
    async fn configured_length_above_bound_is_clamped() {
        let synth = AnswerSynthesizer::new(
            Some(Arc::new(FixedProvider(Ok("x".repeat(400))))),
            250,
        );
        assert_eq!(synth.max_chars(), DEFAULT_MAX_ANSWER_CHARS);
        assert!(synth.has_remote());
        assert_eq!(synth.synthesize("q", "ctx").await.chars().count(), 200);

        let local = AnswerSynthesizer::local(1000);
        assert!(!local.has_remote());
        let answer = local.synthesize("q", &"w ".repeat(300)).await;
        assert_eq!(answer.chars().count(), 200);
    }

    #[test]
    fn shorter_configured_length_is_kept() {
        assert_eq!(AnswerSynthesizer::local(120).max_chars(), 120);
    }
}
