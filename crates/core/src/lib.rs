//! Core types for the policy QA agent graph
//!
//! This crate provides the shared data model used across all other crates:
//! - Chunk and document types as read from the chunk store
//! - Search result types (wire shape returned to callers)
//! - Preprocessed query type
//! - Request state threaded through the agent graph
//! - Answer validation report types
//! - Error types

pub mod chunk;
pub mod error;
pub mod query;
pub mod search;
pub mod state;
pub mod validation;

pub use chunk::{AdjacentChunks, AnnotatedChunk, Chunk, ChunkType, DocumentInfo};
pub use error::{Error, Result};
pub use query::PreprocessedQuery;
pub use search::{ResultMetadata, SearchLogEntry, SearchResult, SearchType};
pub use state::{ExpandDirection, ExpandRequest, RequestState, TaskType};
pub use validation::{ValidationDetail, ValidationReport};

/// Dimension of chunk embeddings (text-embedding-3-large, truncated).
pub const EMBEDDING_DIM: usize = 1536;
