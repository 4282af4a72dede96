//! Retrieval core
//!
//! Features:
//! - Query preprocessing (normalization, domain-term standardization,
//!   synonym-expanded noun keywords, clause-number detection,
//!   incomplete-query detection)
//! - Dense vector search over the chunk store
//! - Conjunctive full-text keyword search
//! - Hybrid fusion with RRF and token-bounded context assembly
//! - Lexical reranking against the lost-in-the-middle failure
//! - Directional chunk expansion with section-boundary awareness
//! - Embedding service with cache-through (redis or in-process LRU)

pub mod cache;
pub mod embeddings;
pub mod expansion;
pub mod fusion;
pub mod hybrid;
pub mod keyword_search;
pub mod preprocessor;
pub mod reranker;
pub mod vector_search;

pub use cache::{CacheBackendKind, CacheFacade, MemoryCache};
pub use embeddings::{Embedder, OpenAiEmbedder, OpenAiEmbedderConfig};
pub use expansion::{ChunkExpander, MergedChunk};
pub use fusion::{optimize_context, reciprocal_rank_fusion};
pub use hybrid::{HybridSearch, HybridSearchOptions};
pub use keyword_search::KeywordSearch;
pub use preprocessor::QueryPreprocessor;
pub use reranker::Reranker;
pub use vector_search::{VectorSearch, VectorSearchOptions};

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Expansion error: {0}")]
    Expansion(String),
}

impl From<RagError> for policy_agent_core::Error {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Embedding(m) => policy_agent_core::Error::Embedding(m),
            RagError::Cache(m) => policy_agent_core::Error::Cache(m),
            RagError::Expansion(m) | RagError::Search(m) => policy_agent_core::Error::Search(m),
        }
    }
}

impl From<policy_agent_store::StoreError> for RagError {
    fn from(err: policy_agent_store::StoreError) -> Self {
        RagError::Search(err.to_string())
    }
}
