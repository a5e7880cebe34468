pub mod completions;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod models;
pub mod prompt;

pub use completions::{
    CompletionBackend, CompletionClientConfig, CompletionError, GeminiCompletionClient,
};
pub use config::AulaConfig;
pub use embeddings::{
    EmbeddingBackend, EmbeddingClientConfig, EmbeddingError, GeminiEmbeddingClient,
    EMBEDDING_DIMENSIONS,
};
pub use prompt::{FALLBACK_REPLY, NO_CONTEXT_SENTINEL};
