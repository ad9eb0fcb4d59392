//! Provider trait for chat-completion backends used by answer synthesis.

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("No content in response")]
    NoContent,
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

/// A backend that turns a system instruction plus one user turn into text.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Current model
    fn model(&self) -> &str;

    /// First message of the completion.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}
