//! Shared error type
//!
//! Crate-level errors (`StoreError`, `RagError`, `LlmError`, `GraphError`)
//! convert into this type at the boundaries where a caller does not care
//! which subsystem failed.

use thiserror::Error;

/// Top-level error for the policy agent.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Preprocessing error: {0}")]
    Preprocess(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;
