//! OpenAI-compatible chat completions provider.

pub mod client;

pub use client::OpenAiCompatibleClient;
