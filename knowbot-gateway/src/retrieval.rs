use serde::Serialize;
use tracing::info;

use knowbot_knowledge::{KnowledgeEngine, KnowledgeEntry, KnowledgeResult};

use crate::answer::{AnswerSynthesizer, DEGRADED_ANSWER};

/// Answer to one question, as returned by `/ask`.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub answer: String,
    pub related: Vec<KnowledgeEntry>,
    pub found_count: usize,
}

impl RetrievalResult {
    /// Reply used when neither search strategy could run.
    pub fn degraded() -> Self {
        Self {
            answer: DEGRADED_ANSWER.to_string(),
            related: Vec::new(),
            found_count: 0,
        }
    }
}

/// Retrieval followed by answer synthesis.
#[derive(Clone, Debug)]
pub struct RetrievalService {
    engine: KnowledgeEngine,
    synthesizer: AnswerSynthesizer,
}

impl RetrievalService {
    pub fn new(engine: KnowledgeEngine, synthesizer: AnswerSynthesizer) -> Self {
        Self {
            engine,
            synthesizer,
        }
    }

    pub fn engine(&self) -> &KnowledgeEngine {
        &self.engine
    }

    pub async fn answer(&self, question: &str) -> KnowledgeResult<RetrievalResult> {
        let retrieval = self.engine.retrieve(question).await?;
        let answer = self
            .synthesizer
            .synthesize(question, &retrieval.context)
            .await;

        info!(
            strategy = retrieval.strategy.as_str(),
            found = retrieval.entries.len(),
            "question answered"
        );
        Ok(RetrievalResult {
            answer,
            found_count: retrieval.entries.len(),
            related: retrieval.entries,
        })
    }
}
