use std::sync::Arc;

use sqlx::SqlitePool;

use crate::KnowledgeSettings;
use crate::embeddings::{EmbeddingProvider, embedding_provider};
use crate::errors::KnowledgeResult;
use crate::models::{KnowledgeEntry, NewEntry, RegenerationReport};
use crate::paths::knowledge_db_path;
use crate::storage::{self, KnowledgeStore};

pub(crate) mod entries;
pub(crate) mod retrieve;

pub use retrieve::{NO_MATCHING_KNOWLEDGE, Retrieval, SearchStrategy, build_context_block};

#[derive(Clone)]
pub struct KnowledgeEngine {
    settings: KnowledgeSettings,
    embedder: Arc<dyn EmbeddingProvider>,
    store: KnowledgeStore,
}

impl std::fmt::Debug for KnowledgeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeEngine")
            .field("settings", &self.settings)
            .field("embedder", &self.embedder.name())
            .field("store", &self.store)
            .finish()
    }
}

impl KnowledgeEngine {
    /// Open the on-disk store and pick the embedding provider from the
    /// presence of `api_key`.
    pub async fn open(settings: KnowledgeSettings, api_key: Option<&str>) -> KnowledgeResult<Self> {
        let path = knowledge_db_path(&settings)?;
        let store = KnowledgeStore::open(&path).await?;
        let embedder = embedding_provider(&settings, api_key)?;
        Ok(Self::new(settings, store, embedder))
    }

    pub fn new(
        settings: KnowledgeSettings,
        store: KnowledgeStore,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            settings,
            embedder,
            store,
        }
    }

    /// Access the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    pub fn settings(&self) -> &KnowledgeSettings {
        &self.settings
    }

    pub(crate) fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    /// Ranked entries for `question`, from the first strategy that finds any.
    pub async fn retrieve(&self, question: &str) -> KnowledgeResult<Retrieval> {
        retrieve::retrieve(self, question).await
    }

    /// Run one strategy on its own, bypassing the fallback chain.
    pub async fn search_with(
        &self,
        strategy: SearchStrategy,
        question: &str,
    ) -> KnowledgeResult<Vec<KnowledgeEntry>> {
        retrieve::run_strategy(self, strategy, question).await
    }

    pub async fn create_entry(&self, entry: NewEntry) -> KnowledgeResult<KnowledgeEntry> {
        entries::create_entry(self, entry).await
    }

    pub async fn update_entry(
        &self,
        id: i64,
        title: &str,
        content: &str,
    ) -> KnowledgeResult<KnowledgeEntry> {
        entries::update_entry(self, id, title, content).await
    }

    pub async fn get_entry(&self, id: i64) -> KnowledgeResult<Option<KnowledgeEntry>> {
        storage::get_entry(self.pool(), id).await
    }

    pub async fn list_entries(&self) -> KnowledgeResult<Vec<KnowledgeEntry>> {
        storage::list_entries(self.pool()).await
    }

    pub async fn delete_entry(&self, id: i64) -> KnowledgeResult<()> {
        storage::delete_entry(self.pool(), id).await
    }

    pub async fn regenerate_embedding(&self, id: i64) -> KnowledgeResult<()> {
        entries::regenerate_embedding(self, id).await
    }

    pub async fn regenerate_all(&self) -> KnowledgeResult<RegenerationReport> {
        entries::regenerate_all(self).await
    }
}
