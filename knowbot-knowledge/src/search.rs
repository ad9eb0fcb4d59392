use sqlx::SqlitePool;

use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::models::KnowledgeEntry;
use crate::storage::{ENTRY_COLUMNS, EMBEDDING_DIM, EntryRow, into_entries};

/// Largest `k` sqlite-vec accepts for a KNN query.
pub const MAX_KNN_RESULTS: usize = 4096;

/// Up to `limit` embedded entries closest to `query` by cosine distance.
///
/// Entries without an embedding never appear. Ties keep the newest id first.
/// `limit` is capped at [`MAX_KNN_RESULTS`].
pub async fn search_by_similarity(
    pool: &SqlitePool,
    query: &[f32],
    limit: usize,
) -> KnowledgeResult<Vec<KnowledgeEntry>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    if query.len() != EMBEDDING_DIM {
        return Err(KnowledgeError::EmbeddingDimMismatch {
            expected: EMBEDDING_DIM,
            actual: query.len(),
        });
    }
    let payload =
        serde_json::to_string(query).map_err(|err| KnowledgeError::Embedding(err.to_string()))?;

    let columns = ENTRY_COLUMNS
        .split(", ")
        .map(|column| format!("e.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    let rows: Vec<EntryRow> = sqlx::query_as(&format!(
        "WITH knn AS (
            SELECT rowid AS entry_id, distance
            FROM knowledge_vec
            WHERE embedding MATCH ? AND k = ?
        )
        SELECT {columns}
        FROM knn
        JOIN knowledge e ON e.id = knn.entry_id
        ORDER BY knn.distance ASC, e.id DESC"
    ))
    .bind(payload)
    .bind(limit.min(MAX_KNN_RESULTS) as i64)
    .fetch_all(pool)
    .await?;

    into_entries(rows)
}

/// Up to `limit` entries whose title or content contains `query`,
/// ignoring case. Title matches rank first, then newest first.
pub async fn search_by_text(
    pool: &SqlitePool,
    query: &str,
    limit: usize,
) -> KnowledgeResult<Vec<KnowledgeEntry>> {
    let needle = query.trim().to_lowercase();
    if limit == 0 || needle.is_empty() {
        return Ok(Vec::new());
    }

    // SQLite LIKE only folds ASCII, so matching happens here.
    let rows: Vec<EntryRow> = sqlx::query_as(&format!(
        "SELECT {ENTRY_COLUMNS} FROM knowledge ORDER BY id DESC"
    ))
    .fetch_all(pool)
    .await?;

    let mut title_hits = Vec::new();
    let mut content_hits = Vec::new();
    for row in rows {
        if row.title.to_lowercase().contains(&needle) {
            title_hits.push(row);
        } else if row.content.to_lowercase().contains(&needle) {
            content_hits.push(row);
        }
    }

    title_hits.extend(content_hits);
    title_hits.truncate(limit);
    into_entries(title_hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LocalEmbedder;
    use crate::models::NewEntry;
    use crate::storage::{KnowledgeStore, insert_entry, save_embedding};

    async fn seeded() -> KnowledgeStore {
        let store = KnowledgeStore::open_in_memory().await.unwrap();
        let pool = store.pool();
        for (title, content) in [
            ("Refund policy", "Refunds are issued within 14 days of purchase."),
            ("Shipping", "We ship worldwide. Refund shipping costs are not covered."),
            ("Office hours", "Support is available 9 to 5 on weekdays."),
        ] {
            let entry = insert_entry(pool, &NewEntry::new(title, content))
                .await
                .unwrap();
            let vector = LocalEmbedder::embed_text(&format!("{title} {content}"));
            save_embedding(pool, entry.id, &vector).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn similarity_limit_beyond_knn_cap_still_searches() {
        let store = seeded().await;
        let query = LocalEmbedder::embed_text(
            "Refund policy Refunds are issued within 14 days of purchase.",
        );
        let results = search_by_similarity(store.pool(), &query, 10_000)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Refund policy");
    }

    #[tokio::test]
    async fn text_search_ranks_title_matches_first() {
        let store = seeded().await;
        let results = search_by_text(store.pool(), "REFUND", 10).await.unwrap();
        let titles: Vec<&str> = results.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Refund policy", "Shipping"]);
    }

    #[tokio::test]
    async fn text_search_respects_limit_and_empty_query() {
        let store = seeded().await;
        assert_eq!(search_by_text(store.pool(), "refund", 1).await.unwrap().len(), 1);
        assert!(search_by_text(store.pool(), "   ", 10).await.unwrap().is_empty());
        assert!(search_by_text(store.pool(), "nothing here", 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn similarity_returns_closest_entry_first() {
        let store = seeded().await;
        let query = LocalEmbedder::embed_text(
            "Refund policy Refunds are issued within 14 days of purchase.",
        );
        let results = search_by_similarity(store.pool(), &query, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Refund policy");
    }

    #[tokio::test]
    async fn similarity_skips_entries_without_embeddings() {
        let store = KnowledgeStore::open_in_memory().await.unwrap();
        insert_entry(store.pool(), &NewEntry::new("bare", "no vector"))
            .await
            .unwrap();

        let query = LocalEmbedder::embed_text("bare");
        let results = search_by_similarity(store.pool(), &query, 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn similarity_with_zero_limit_is_empty() {
        let store = seeded().await;
        let query = LocalEmbedder::embed_text("refund");
        assert!(search_by_similarity(store.pool(), &query, 0)
            .await
            .unwrap()
            .is_empty());
    }
}
