use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored knowledge entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

impl NewEntry {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            created_by: default_created_by(),
        }
    }
}

pub(crate) fn default_created_by() -> String {
    "user".to_string()
}

/// Outcome of regenerating every stored embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegenerationReport {
    pub regenerated: usize,
    pub errors: usize,
    pub total: usize,
}
