use std::ffi::c_char;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use libsqlite3_sys::{SQLITE_OK, sqlite3, sqlite3_api_routines, sqlite3_auto_extension};
use sqlite_vec::sqlite3_vec_init;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::models::{KnowledgeEntry, NewEntry};

/// Width of every stored embedding.
pub const EMBEDDING_DIM: usize = 1536;

static SQLITE_VEC_INIT_RC: OnceLock<i32> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    pool: SqlitePool,
}

impl KnowledgeStore {
    pub async fn open(db_path: &Path) -> KnowledgeResult<Self> {
        init_sqlite_vec_once()?;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous = NORMAL")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;

        Self::prepare(pool).await
    }

    /// Private in-memory database; used by tests and ephemeral runs.
    pub async fn open_in_memory() -> KnowledgeResult<Self> {
        init_sqlite_vec_once()?;
        let options = SqliteConnectOptions::new().in_memory(true);

        // Every connection to `:memory:` is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::prepare(pool).await
    }

    async fn prepare(pool: SqlitePool) -> KnowledgeResult<Self> {
        run_migrations(&pool).await?;
        ensure_vec_table(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn init_sqlite_vec_once() -> KnowledgeResult<()> {
    let rc = *SQLITE_VEC_INIT_RC.get_or_init(|| unsafe {
        type SqliteVecInitFn = unsafe extern "C" fn(
            *mut sqlite3,
            *mut *mut c_char,
            *const sqlite3_api_routines,
        ) -> i32;

        sqlite3_auto_extension(Some(std::mem::transmute::<*const (), SqliteVecInitFn>(
            sqlite3_vec_init as *const (),
        )))
    });

    if rc == SQLITE_OK {
        Ok(())
    } else {
        Err(KnowledgeError::SqliteVec(format!(
            "sqlite-vec init failed with code {rc}"
        )))
    }
}

async fn run_migrations(pool: &SqlitePool) -> KnowledgeResult<()> {
    sqlx::migrate!("./migrations/knowledge").run(pool).await?;
    Ok(())
}

async fn ensure_vec_table(pool: &SqlitePool) -> KnowledgeResult<()> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT value FROM meta WHERE key = 'embedding_dim' LIMIT 1")
            .fetch_optional(pool)
            .await?;

    if let Some((value,)) = existing
        && value.parse::<usize>().ok() != Some(EMBEDDING_DIM)
    {
        return Err(KnowledgeError::EmbeddingDimMismatch {
            expected: EMBEDDING_DIM,
            actual: value.parse().unwrap_or(0),
        });
    }

    let create_sql = format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_vec USING vec0(embedding float[{EMBEDDING_DIM}] distance_metric=cosine)"
    );
    sqlx::query(&create_sql).execute(pool).await?;

    sqlx::query("INSERT OR REPLACE INTO meta (key, value) VALUES ('embedding_dim', ?)")
        .bind(EMBEDDING_DIM.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

#[derive(Debug, FromRow)]
pub(crate) struct EntryRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_by: String,
    pub created_at: String,
}

impl TryFrom<EntryRow> for KnowledgeEntry {
    type Error = KnowledgeError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|_| KnowledgeError::InvalidTimestamp(row.created_at.clone()))?
            .with_timezone(&Utc);
        Ok(Self {
            id: row.id,
            title: row.title,
            content: row.content,
            created_by: row.created_by,
            created_at,
        })
    }
}

pub(crate) fn into_entries(rows: Vec<EntryRow>) -> KnowledgeResult<Vec<KnowledgeEntry>> {
    rows.into_iter().map(KnowledgeEntry::try_from).collect()
}

pub(crate) const ENTRY_COLUMNS: &str = "id, title, content, created_by, created_at";

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn validate(title: &str, content: &str) -> KnowledgeResult<()> {
    if title.trim().is_empty() {
        return Err(KnowledgeError::InvalidEntry("title is required"));
    }
    if content.trim().is_empty() {
        return Err(KnowledgeError::InvalidEntry("content is required"));
    }
    Ok(())
}

pub async fn insert_entry(pool: &SqlitePool, entry: &NewEntry) -> KnowledgeResult<KnowledgeEntry> {
    validate(&entry.title, &entry.content)?;
    let now = now_timestamp();
    let created_by = if entry.created_by.trim().is_empty() {
        crate::models::default_created_by()
    } else {
        entry.created_by.clone()
    };

    let row: EntryRow = sqlx::query_as(&format!(
        "INSERT INTO knowledge (title, content, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(&entry.title)
    .bind(&entry.content)
    .bind(&created_by)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get_entry(pool: &SqlitePool, id: i64) -> KnowledgeResult<Option<KnowledgeEntry>> {
    let row: Option<EntryRow> = sqlx::query_as(&format!(
        "SELECT {ENTRY_COLUMNS} FROM knowledge WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(KnowledgeEntry::try_from).transpose()
}

/// All entries, newest first.
pub async fn list_entries(pool: &SqlitePool) -> KnowledgeResult<Vec<KnowledgeEntry>> {
    let rows: Vec<EntryRow> = sqlx::query_as(&format!(
        "SELECT {ENTRY_COLUMNS} FROM knowledge ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;

    into_entries(rows)
}

pub async fn update_entry(
    pool: &SqlitePool,
    id: i64,
    title: &str,
    content: &str,
) -> KnowledgeResult<KnowledgeEntry> {
    validate(title, content)?;
    let row: Option<EntryRow> = sqlx::query_as(&format!(
        "UPDATE knowledge SET title = ?, content = ?, updated_at = ?
         WHERE id = ?
         RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(title)
    .bind(content)
    .bind(now_timestamp())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(KnowledgeError::UnknownEntry(id))?.try_into()
}

/// Remove an entry together with its embedding.
pub async fn delete_entry(pool: &SqlitePool, id: i64) -> KnowledgeResult<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM knowledge_vec WHERE rowid = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM knowledge WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(KnowledgeError::UnknownEntry(id));
    }
    tx.commit().await?;
    Ok(())
}

/// Replace the embedding for `entry_id`; the old vector never survives
/// alongside the new one.
pub async fn save_embedding(
    pool: &SqlitePool,
    entry_id: i64,
    embedding: &[f32],
) -> KnowledgeResult<()> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(KnowledgeError::EmbeddingDimMismatch {
            expected: EMBEDDING_DIM,
            actual: embedding.len(),
        });
    }
    let payload = serde_json::to_string(embedding)
        .map_err(|err| KnowledgeError::Embedding(err.to_string()))?;

    let mut tx = pool.begin().await?;
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM knowledge WHERE id = ?")
        .bind(entry_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        tx.rollback().await?;
        return Err(KnowledgeError::UnknownEntry(entry_id));
    }

    sqlx::query("DELETE FROM knowledge_vec WHERE rowid = ?")
        .bind(entry_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO knowledge_vec (rowid, embedding) VALUES (?, ?)")
        .bind(entry_id)
        .bind(payload)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Drop the embedding for `entry_id`; absence is not an error.
pub async fn delete_embedding(pool: &SqlitePool, entry_id: i64) -> KnowledgeResult<()> {
    sqlx::query("DELETE FROM knowledge_vec WHERE rowid = ?")
        .bind(entry_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn has_embedding(pool: &SqlitePool, entry_id: i64) -> KnowledgeResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT rowid FROM knowledge_vec WHERE rowid = ?")
        .bind(entry_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}
