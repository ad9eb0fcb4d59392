use std::sync::Arc;

use knowbot_core::{Config, GatewaySettings, RateWindowSettings};
use knowbot_knowledge::{KnowledgeEngine, KnowledgeError};
use tracing::info;

use crate::answer::AnswerSynthesizer;
use crate::providers::openai_compatible::OpenAiCompatibleClient;
use crate::providers::{ChatProvider, ProviderError};
use crate::rate_limit::RateLimiter;
use crate::retrieval::RetrievalService;

/// Errors raised while assembling the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] knowbot_core::ConfigError),
    #[error("knowledge store error: {0}")]
    Knowledge(#[from] KnowledgeError),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state; every limiter is owned here, never global.
#[derive(Clone)]
pub struct AppState {
    retrieval: RetrievalService,
    general_limiter: Arc<RateLimiter>,
    search_limiter: Arc<RateLimiter>,
    allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(
        engine: KnowledgeEngine,
        synthesizer: AnswerSynthesizer,
        general_limiter: Arc<RateLimiter>,
        search_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            retrieval: RetrievalService::new(engine, synthesizer),
            general_limiter,
            search_limiter,
            allowed_origins: GatewaySettings::default().allowed_origins,
        }
    }

    /// Replace the origins answered with CORS headers.
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Open the store and build providers and limiters from `config`.
    pub async fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let api_key = config.openai_api_key();
        let engine = KnowledgeEngine::open(config.knowledge_settings(), api_key).await?;

        let answer = &config.settings.answer;
        let provider: Option<Arc<dyn ChatProvider>> = match api_key {
            Some(key) => {
                let client = OpenAiCompatibleClient::new(
                    &answer.chat_url,
                    key,
                    &answer.model,
                    answer.request_timeout(),
                )?;
                info!("Chat provider configured with model: {}", answer.model);
                Some(Arc::new(client))
            }
            None => {
                info!("No OPENAI_API_KEY configured, using local embeddings and answers");
                None
            }
        };
        let synthesizer = AnswerSynthesizer::new(provider, answer.max_chars);
        info!(
            remote = synthesizer.has_remote(),
            max_chars = synthesizer.max_chars(),
            "Answer synthesizer ready"
        );

        let limits = &config.settings.rate_limits;
        let general = Arc::new(limiter(&limits.general));
        let search = Arc::new(limiter(&limits.search));
        info!(
            "Rate limits: general {}/{}s, search {}/{}s",
            general.limit(),
            general.window().as_secs(),
            search.limit(),
            search.window().as_secs()
        );

        Ok(Self::new(engine, synthesizer, general, search)
            .with_allowed_origins(config.settings.gateway.allowed_origins.clone()))
    }

    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    pub fn engine(&self) -> &KnowledgeEngine {
        self.retrieval.engine()
    }

    /// Limiter for CRUD and admin routes.
    pub fn general_limiter(&self) -> &Arc<RateLimiter> {
        &self.general_limiter
    }

    /// Limiter for `/ask`.
    pub fn search_limiter(&self) -> &Arc<RateLimiter> {
        &self.search_limiter
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }
}

fn limiter(window: &RateWindowSettings) -> RateLimiter {
    RateLimiter::new(window.limit, window.window())
}
