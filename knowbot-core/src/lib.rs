pub mod config;

// Config re-exports
pub use config::{
    AnswerSettings,
    Config,
    ConfigError,
    GatewaySettings,
    KnowledgeSettings,
    KnowledgeToolsSettings,
    LoggingSettings,
    RateLimitSettings,
    RateWindowSettings,
    Secrets,
    SecretsError,
    Settings,
    SettingsError,
    load_dotenv,
};
