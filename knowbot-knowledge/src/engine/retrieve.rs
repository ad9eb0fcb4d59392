use tracing::{debug, warn};

use crate::errors::KnowledgeResult;
use crate::models::KnowledgeEntry;
use crate::search::{search_by_similarity, search_by_text};
use crate::text::cap_chars;

use super::KnowledgeEngine;

/// Context block used when no entry matched.
pub const NO_MATCHING_KNOWLEDGE: &str = "No matching knowledge.";

const CONTEXT_HEADER: &str = "Knowledge base entries:";

/// Retrieval strategies in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Similarity,
    Lexical,
}

impl SearchStrategy {
    pub const PIPELINE: [SearchStrategy; 2] = [SearchStrategy::Similarity, SearchStrategy::Lexical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Similarity => "similarity",
            Self::Lexical => "lexical",
        }
    }
}

/// Ranked entries plus the context block built from them.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub entries: Vec<KnowledgeEntry>,
    /// Strategy that produced `entries`; the last one tried when empty.
    pub strategy: SearchStrategy,
    pub context: String,
}

pub(crate) async fn run_strategy(
    engine: &KnowledgeEngine,
    strategy: SearchStrategy,
    question: &str,
) -> KnowledgeResult<Vec<KnowledgeEntry>> {
    let limit = engine.settings().search_limit;
    match strategy {
        SearchStrategy::Similarity => {
            let vector = engine.embedder().embed(question).await?;
            search_by_similarity(engine.pool(), &vector, limit).await
        }
        SearchStrategy::Lexical => search_by_text(engine.pool(), question, limit).await,
    }
}

pub(crate) async fn retrieve(
    engine: &KnowledgeEngine,
    question: &str,
) -> KnowledgeResult<Retrieval> {
    let mut last = Ok(Vec::new());
    let mut used = SearchStrategy::Lexical;

    for strategy in SearchStrategy::PIPELINE {
        used = strategy;
        match run_strategy(engine, strategy, question).await {
            Ok(entries) if !entries.is_empty() => {
                debug!(strategy = strategy.as_str(), found = entries.len(), "retrieval hit");
                last = Ok(entries);
                break;
            }
            Ok(entries) => last = Ok(entries),
            Err(err) => {
                warn!(
                    strategy = strategy.as_str(),
                    kind = ?err.kind(),
                    error = %err,
                    "search strategy failed"
                );
                last = Err(err);
            }
        }
    }

    let entries = last?;
    let context = build_context_block(&entries, engine.settings().snippet_chars);
    Ok(Retrieval {
        entries,
        strategy: used,
        context,
    })
}

/// Format ranked entries for answer synthesis.
///
/// Each entry becomes `[title]` on its own line followed by its content
/// capped to `snippet_chars`; entries are separated by a blank line.
pub fn build_context_block(entries: &[KnowledgeEntry], snippet_chars: usize) -> String {
    if entries.is_empty() {
        return NO_MATCHING_KNOWLEDGE.to_string();
    }

    let blocks: Vec<String> = entries
        .iter()
        .map(|entry| format!("[{}]\n{}", entry.title, cap_chars(&entry.content, snippet_chars)))
        .collect();
    format!("{CONTEXT_HEADER}\n\n{}", blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entry(id: i64, title: &str, content: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created_by: "user".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_results_use_marker() {
        assert_eq!(build_context_block(&[], 150), NO_MATCHING_KNOWLEDGE);
    }

    #[test]
    fn blocks_are_labeled_and_separated() {
        let block = build_context_block(
            &[entry(2, "Refunds", "Within 14 days."), entry(1, "Shipping", "Worldwide.")],
            150,
        );
        assert_eq!(
            block,
            "Knowledge base entries:\n\n[Refunds]\nWithin 14 days.\n\n[Shipping]\nWorldwide."
        );
    }

    #[test]
    fn long_content_is_capped() {
        let content = "x".repeat(300);
        let block = build_context_block(&[entry(1, "Refunds", &content)], 150);
        let expected = format!("[Refunds]\n{}...", "x".repeat(147));
        assert!(block.ends_with(&expected));
        assert!(!block.contains(&"x".repeat(148)));
    }
}
