//! Chunk and document types
//!
//! A chunk is the unit of retrieval: a bounded substring of a policy
//! document with its own embedding and lexeme vector, ordered within its
//! document by `chunk_index`. Chunks are produced by ingestion and consumed
//! read-only here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of content a chunk holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Text,
    Table,
    Image,
}

impl Default for ChunkType {
    fn default() -> Self {
        ChunkType::Text
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkType::Text => write!(f, "text"),
            ChunkType::Table => write!(f, "table"),
            ChunkType::Image => write!(f, "image"),
        }
    }
}

/// A stored document chunk.
///
/// Invariants (maintained by ingestion, relied upon here):
/// - within a `document_id`, `chunk_index` values are dense and totally
///   ordered; adjacency is `chunk_index ± 1`
/// - `token_count` equals the cl100k_base token count of `content`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: i64,
    pub document_id: i64,
    pub chunk_index: i32,
    pub content: String,
    pub chunk_type: ChunkType,
    pub token_count: Option<i32>,
    pub page_number: Option<i32>,
    pub section_title: Option<String>,
    pub clause_number: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Document fields joined onto search results for annotation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: Option<String>,
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub company_name: Option<String>,
}

/// A chunk annotated with its parent document, as returned by the store.
#[derive(Debug, Clone)]
pub struct AnnotatedChunk {
    pub chunk: Chunk,
    pub document: DocumentInfo,
    /// Retrieval score: cosine similarity for vector search, `ts_rank`
    /// for full-text search, 1.0 for direct lookups.
    pub score: f64,
}

/// Neighbors of a chunk, ordered by ascending `chunk_index` on both sides.
#[derive(Debug, Clone, Default)]
pub struct AdjacentChunks {
    pub prev: Vec<AnnotatedChunk>,
    pub next: Vec<AnnotatedChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChunkType::Table).unwrap(), "\"table\"");
        let parsed: ChunkType = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(parsed, ChunkType::Image);
    }

    #[test]
    fn document_info_uses_type_key() {
        let info = DocumentInfo {
            filename: Some("약관.pdf".to_string()),
            document_type: Some("policy".to_string()),
            company_name: Some("흥국생명".to_string()),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "policy");
    }
}
