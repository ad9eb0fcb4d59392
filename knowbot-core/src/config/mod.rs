//! Configuration management for knowbot.
//!
//! Secrets come from environment variables, everything else from a TOML file.
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `OPENAI_API_KEY` - credential for the embedding and chat-completion providers.
//!   When unset, the deterministic local embedder and templated answers are used.
//!
//! ## Settings (TOML File)
//! Located at `~/.config/knowbot/config.toml` (or `$KNOWBOT_CONFIG_DIR/config.toml`):
//! ```toml
//! [gateway]
//! host = "127.0.0.1"
//! port = 8080
//! allowed_origins = ["http://localhost:3000"]
//!
//! [knowledge]
//! embedding_model = "text-embedding-3-small"
//! search_limit = 10
//!
//! [answer]
//! model = "gpt-4o-mini"
//! max_chars = 200
//!
//! [rate_limits.search]
//! limit = 30
//! window_seconds = 60
//! ```

pub mod knowledge;
mod secrets;
mod settings;

pub use knowledge::KnowledgeSettings;
pub use secrets::{Secrets, SecretsError};
pub use settings::{
    AnswerSettings, GatewaySettings, KnowledgeToolsSettings, LoggingSettings, RateLimitSettings,
    RateWindowSettings, Settings, SettingsError,
};

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Rate limit '{0}' must allow at least one request per non-empty window")]
    InvalidRateLimit(&'static str),

    #[error("Rate limit sweep interval must be at least one second")]
    InvalidSweepInterval,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// This loads:
    /// 1. Secrets from environment variables
    /// 2. Settings from TOML file (creating defaults if needed)
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load()?;
        Self::from_parts(secrets, settings)
    }

    /// Combine already-loaded parts, validating cross-field constraints.
    pub fn from_parts(secrets: Secrets, settings: Settings) -> Result<Self, ConfigError> {
        for (name, window) in [
            ("general", &settings.rate_limits.general),
            ("search", &settings.rate_limits.search),
        ] {
            if window.limit == 0 || window.window_seconds == 0 {
                return Err(ConfigError::InvalidRateLimit(name));
            }
        }
        if settings.rate_limits.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }

        Ok(Self { secrets, settings })
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        self.settings.bind_addr()
    }

    /// Get the OpenAI API key (if configured).
    pub fn openai_api_key(&self) -> Option<&str> {
        self.secrets.openai_api_key.as_deref()
    }

    /// Resolved settings for the knowledge crate.
    pub fn knowledge_settings(&self) -> KnowledgeSettings {
        KnowledgeSettings::from(&self.settings.knowledge)
    }
}

/// Load .env file if it exists (for development convenience).
///
/// This is called automatically by `Secrets::from_env()` but is also
/// exposed for binaries that read other variables before loading config.
pub fn load_dotenv() {
    // Silently ignore errors (file might not exist)
    let _ = dotenvy::dotenv();
}
