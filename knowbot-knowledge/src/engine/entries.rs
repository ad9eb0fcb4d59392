use tracing::{info, warn};

use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::models::{KnowledgeEntry, NewEntry, RegenerationReport};
use crate::storage::{self, delete_embedding, save_embedding};

use super::KnowledgeEngine;

/// Embed and store the vector; failures leave the entry lexically searchable.
async fn embed_best_effort(engine: &KnowledgeEngine, entry: &KnowledgeEntry) {
    if let Err(err) = embed_and_save(engine, entry).await {
        warn!(
            entry_id = entry.id,
            provider = engine.embedder().name(),
            error = %err,
            "embedding not stored"
        );
    }
}

async fn embed_and_save(engine: &KnowledgeEngine, entry: &KnowledgeEntry) -> KnowledgeResult<()> {
    let vector = engine.embedder().embed(&entry.content).await?;
    save_embedding(engine.pool(), entry.id, &vector).await
}

pub(crate) async fn create_entry(
    engine: &KnowledgeEngine,
    entry: NewEntry,
) -> KnowledgeResult<KnowledgeEntry> {
    let created = storage::insert_entry(engine.pool(), &entry).await?;
    embed_best_effort(engine, &created).await;
    info!(entry_id = created.id, "knowledge entry created");
    Ok(created)
}

pub(crate) async fn update_entry(
    engine: &KnowledgeEngine,
    id: i64,
    title: &str,
    content: &str,
) -> KnowledgeResult<KnowledgeEntry> {
    let updated = storage::update_entry(engine.pool(), id, title, content).await?;
    embed_best_effort(engine, &updated).await;
    Ok(updated)
}

pub(crate) async fn regenerate_embedding(engine: &KnowledgeEngine, id: i64) -> KnowledgeResult<()> {
    let entry = storage::get_entry(engine.pool(), id)
        .await?
        .ok_or(KnowledgeError::UnknownEntry(id))?;

    if let Err(err) = delete_embedding(engine.pool(), id).await {
        warn!(entry_id = id, error = %err, "failed to clear old embedding");
    }
    embed_and_save(engine, &entry).await
}

pub(crate) async fn regenerate_all(engine: &KnowledgeEngine) -> KnowledgeResult<RegenerationReport> {
    let entries = storage::list_entries(engine.pool()).await?;
    let mut report = RegenerationReport {
        total: entries.len(),
        ..Default::default()
    };

    for entry in &entries {
        if let Err(err) = delete_embedding(engine.pool(), entry.id).await {
            warn!(entry_id = entry.id, error = %err, "failed to clear old embedding");
        }
        match embed_and_save(engine, entry).await {
            Ok(()) => report.regenerated += 1,
            Err(err) => {
                warn!(entry_id = entry.id, error = %err, "embedding regeneration failed");
                report.errors += 1;
            }
        }
    }

    info!(
        regenerated = report.regenerated,
        errors = report.errors,
        total = report.total,
        "embedding regeneration finished"
    );
    Ok(report)
}
