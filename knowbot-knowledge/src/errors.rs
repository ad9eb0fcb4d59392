/// Coarse classification of a failure, used to decide how it surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Malformed or empty input; reported to the caller as a 4xx.
    ClientInput,
    /// Request rejected by admission control.
    Admission,
    /// Embedding or chat provider unreachable, non-200 or undecodable.
    Upstream,
    /// Database failure.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("missing data directory")]
    MissingDataDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("sqlite-vec initialization error: {0}")]
    SqliteVec(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimMismatch { expected: usize, actual: usize },
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("unknown knowledge entry: {0}")]
    UnknownEntry(i64),
    #[error("invalid knowledge entry: {0}")]
    InvalidEntry(&'static str),
    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(String),
}

impl KnowledgeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnknownEntry(_) | Self::InvalidEntry(_) => FailureKind::ClientInput,
            Self::Http(_) | Self::Embedding(_) | Self::EmbeddingDimMismatch { .. } => {
                FailureKind::Upstream
            }
            Self::MissingDataDir
            | Self::Io(_)
            | Self::Sqlx(_)
            | Self::Migrate(_)
            | Self::SqliteVec(_)
            | Self::InvalidTimestamp(_) => FailureKind::Storage,
        }
    }
}

pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
