//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/knowbot/config.toml).

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# knowbot configuration file
# Located at: ~/.config/knowbot/config.toml
#
# This file contains non-sensitive configuration.
# Secrets (API keys) are loaded from environment variables:
#   - OPENAI_API_KEY (optional; without it the local embedder and
#     templated answers are used)

[gateway]
host = "127.0.0.1"
port = 8080
# Browser origins allowed to call the API cross-origin
allowed_origins = ["http://localhost:3000"]

[logging]
level = "info"

[knowledge]
# db_path = "/var/lib/knowbot/knowledge.sqlite3"
embedding_url = "https://api.openai.com/v1/embeddings"
embedding_model = "text-embedding-3-small"
search_limit = 10
snippet_chars = 150
request_timeout_seconds = 30

[answer]
chat_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
max_chars = 200
request_timeout_seconds = 30

[rate_limits]
sweep_interval_seconds = 300

[rate_limits.general]
limit = 60
window_seconds = 60

[rate_limits.search]
limit = 30
window_seconds = 60
"#;

/// Settings loaded from TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Gateway server configuration
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Knowledge store, embedding and search configuration
    #[serde(default)]
    pub knowledge: KnowledgeToolsSettings,

    /// Answer synthesis configuration
    #[serde(default)]
    pub answer: AnswerSettings,

    /// Admission control configuration
    #[serde(default)]
    pub rate_limits: RateLimitSettings,
}

/// Gateway server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    /// Host to bind to
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Origins answered with CORS headers
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Knowledge configuration as written by the user. Unset values are filled
/// in when converting to [`crate::KnowledgeSettings`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KnowledgeToolsSettings {
    /// Optional override for the knowledge database path
    pub db_path: Option<String>,

    /// Embedding endpoint URL
    pub embedding_url: Option<String>,

    /// Embedding model name
    pub embedding_model: Option<String>,

    /// Maximum number of entries a search returns
    pub search_limit: Option<usize>,

    /// Per-entry content length in the context block (code points)
    pub snippet_chars: Option<usize>,

    /// Timeout for outbound embedding calls
    pub request_timeout_seconds: Option<u64>,
}

/// Answer synthesis settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerSettings {
    /// Base URL of the chat-completion provider
    #[serde(default = "default_chat_url")]
    pub chat_url: String,

    /// Chat model identifier
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Maximum answer length in code points
    #[serde(default = "default_answer_max_chars")]
    pub max_chars: usize,

    /// Timeout for outbound chat-completion calls
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            chat_url: default_chat_url(),
            model: default_chat_model(),
            max_chars: default_answer_max_chars(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl AnswerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Rate limiter settings, one window per endpoint class.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitSettings {
    /// Knowledge CRUD endpoints
    #[serde(default = "default_general_window")]
    pub general: RateWindowSettings,

    /// Ask/search endpoints
    #[serde(default = "default_search_window")]
    pub search: RateWindowSettings,

    /// How often stale request logs are swept
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            general: default_general_window(),
            search: default_search_window(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl RateLimitSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// A single sliding window: at most `limit` requests per `window_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateWindowSettings {
    pub limit: usize,
    pub window_seconds: u64,
}

impl RateWindowSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_chat_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_answer_max_chars() -> usize {
    200
}

pub(crate) fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_general_window() -> RateWindowSettings {
    RateWindowSettings {
        limit: 60,
        window_seconds: 60,
    }
}

fn default_search_window() -> RateWindowSettings {
    RateWindowSettings {
        limit: 30,
        window_seconds: 60,
    }
}

fn default_sweep_interval_seconds() -> u64 {
    300
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Serialize settings to TOML content.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    ///
    /// Uses `$KNOWBOT_CONFIG_DIR/config.toml` when set, otherwise the XDG
    /// config directory: `~/.config/knowbot/config.toml`
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("KNOWBOT_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("knowbot");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &PathBuf) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG_TOML)?;

        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}
