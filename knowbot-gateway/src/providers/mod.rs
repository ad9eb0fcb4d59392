pub mod openai_compatible;
pub mod provider;

pub use provider::{ChatProvider, ProviderError};
