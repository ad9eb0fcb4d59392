//! HTTP gateway for knowbot: rate limiting, answer synthesis and the
//! `/ask` and `/knowledge` routes.

pub mod answer;
pub mod providers;
pub mod rate_limit;
pub mod retrieval;
pub mod server;
pub mod state;

pub use answer::AnswerSynthesizer;
pub use providers::{ChatProvider, ProviderError};
pub use rate_limit::{ClientKey, RateLimiter, client_key};
pub use retrieval::{RetrievalResult, RetrievalService};
pub use state::{AppState, GatewayError};
