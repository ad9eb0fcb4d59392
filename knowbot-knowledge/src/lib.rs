//! Knowledge store and retrieval pipeline for knowbot.
//!
//! Entries live in SQLite; one embedding per entry lives in a `vec0` table.
//! A question is answered from whichever search strategy first yields
//! entries: cosine similarity over embeddings, then substring matching.

pub mod embeddings;
pub mod engine;
pub mod errors;
pub mod models;
pub mod paths;
pub mod search;
pub mod storage;
pub mod text;

pub use embeddings::{
    EmbeddingProvider, LocalEmbedder, RemoteEmbeddingClient, cosine_distance, embedding_provider,
};
pub use engine::{KnowledgeEngine, NO_MATCHING_KNOWLEDGE, Retrieval, SearchStrategy};
pub use errors::{FailureKind, KnowledgeError, KnowledgeResult};
pub use knowbot_core::KnowledgeSettings;
pub use models::{KnowledgeEntry, NewEntry, RegenerationReport};
pub use storage::{EMBEDDING_DIM, KnowledgeStore};
pub use text::cap_chars;
