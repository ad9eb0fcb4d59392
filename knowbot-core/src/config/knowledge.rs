//! Knowledge system configuration types.
//!
//! These types define the resolved (non-optional) settings used by
//! `knowbot-knowledge`. They are created from the user-facing
//! `KnowledgeToolsSettings` TOML struct via `From`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::settings::{KnowledgeToolsSettings, default_request_timeout_seconds};

/// Resolved knowledge settings (all values filled with defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    #[serde(default)]
    pub db_path_override: Option<PathBuf>,
    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            db_path_override: None,
            embedding_url: default_embedding_url(),
            embedding_model: default_embedding_model(),
            search_limit: default_search_limit(),
            snippet_chars: default_snippet_chars(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl KnowledgeSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn default_embedding_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_search_limit() -> usize {
    10
}

fn default_snippet_chars() -> usize {
    150
}

impl From<&KnowledgeToolsSettings> for KnowledgeSettings {
    fn from(value: &KnowledgeToolsSettings) -> Self {
        let mut settings = KnowledgeSettings::default();
        if let Some(path) = &value.db_path {
            settings.db_path_override = Some(PathBuf::from(path));
        }
        if let Some(url) = &value.embedding_url {
            settings.embedding_url = url.clone();
        }
        if let Some(model) = &value.embedding_model {
            settings.embedding_model = model.clone();
        }
        if let Some(limit) = value.search_limit {
            settings.search_limit = limit;
        }
        if let Some(chars) = value.snippet_chars {
            settings.snippet_chars = chars;
        }
        if let Some(seconds) = value.request_timeout_seconds {
            settings.request_timeout_seconds = seconds;
        }
        settings
    }
}
