//! Chunk store
//!
//! Read-only access to ingested policy chunks:
//! - `ChunkStore` trait consumed by the search and expansion pipeline
//! - PostgreSQL implementation (pgvector cosine search, `tsquery` FTS,
//!   adjacency by document ordinal, clause lookups)
//! - In-memory implementation with the same ordering semantics for tests
//! - Append-only search log sink

pub mod chunk_store;
pub mod memory;
pub mod pool;
pub mod search_log;

pub use chunk_store::{ChunkStore, PgChunkStore, SearchFilters};
pub use memory::{MemoryChunkStore, StoredChunk};
pub use pool::connect_pool;
pub use search_log::{MemorySearchLogSink, NullSearchLogSink, PgSearchLogSink, SearchLogSink};

use thiserror::Error;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<StoreError> for policy_agent_core::Error {
    fn from(err: StoreError) -> Self {
        policy_agent_core::Error::Store(err.to_string())
    }
}
