//! Search result types
//!
//! `SearchResult` is the transport record flowing from search into context
//! judgement and answer generation, and the wire shape returned to the
//! caller above the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::chunk::{AnnotatedChunk, ChunkType, DocumentInfo};

/// Which searcher produced a logged search event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Vector,
    Keyword,
    Hybrid,
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchType::Vector => write!(f, "vector"),
            SearchType::Keyword => write!(f, "keyword"),
            SearchType::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Extended result metadata.
///
/// `expanded` and `included_chunks` are written by chunk expansion; the
/// rerank fields preserve the pre-rerank ordering for observability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expanded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_chunks: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_exact_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_final_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_rank: Option<usize>,
    /// Free-form metadata carried over from the stored chunk.
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One retrieved (possibly expanded) chunk with its document annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub document_id: i64,
    pub content: String,
    /// Semantic score. Carries cosine similarity out of vector search,
    /// `ts_rank` out of keyword search, and the RRF score after fusion.
    pub similarity: f64,
    pub chunk_type: ChunkType,
    pub page_number: Option<i32>,
    pub section_title: Option<String>,
    pub clause_number: Option<String>,
    #[serde(default)]
    pub metadata: ResultMetadata,
    pub document: DocumentInfo,
    /// Stored token count, when the chunk carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<i32>,
}

impl SearchResult {
    /// Build a result from a store row, keeping the store's score in the
    /// similarity slot.
    pub fn from_annotated(chunk: AnnotatedChunk) -> Self {
        let AnnotatedChunk { chunk, document, score } = chunk;
        let mut metadata = ResultMetadata::default();
        metadata.extra = chunk.metadata;
        Self {
            chunk_id: chunk.chunk_id,
            document_id: chunk.document_id,
            content: chunk.content,
            similarity: score,
            chunk_type: chunk.chunk_type,
            page_number: chunk.page_number,
            section_title: chunk.section_title,
            clause_number: chunk.clause_number,
            metadata,
            document,
            token_count: chunk.token_count,
        }
    }
}

/// Append-only structured record of one search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub user_id: Option<i64>,
    pub query: String,
    pub query_intent: Option<String>,
    pub search_type: SearchType,
    pub results_count: usize,
    pub top_similarity: f64,
    pub response_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;

    fn annotated(id: i64, content: &str, score: f64) -> AnnotatedChunk {
        AnnotatedChunk {
            chunk: Chunk {
                chunk_id: id,
                document_id: 1,
                chunk_index: id as i32,
                content: content.to_string(),
                chunk_type: ChunkType::Text,
                token_count: Some(10),
                page_number: Some(3),
                section_title: None,
                clause_number: Some("제15조".to_string()),
                metadata: HashMap::new(),
            },
            document: DocumentInfo {
                filename: Some("암보험약관.pdf".to_string()),
                document_type: Some("policy".to_string()),
                company_name: None,
            },
            score,
        }
    }

    #[test]
    fn from_annotated_keeps_score_and_annotation() {
        let result = SearchResult::from_annotated(annotated(7, "제15조 내용", 0.83));
        assert_eq!(result.chunk_id, 7);
        assert!((result.similarity - 0.83).abs() < 1e-9);
        assert_eq!(result.document.filename.as_deref(), Some("암보험약관.pdf"));
        assert!(!result.metadata.expanded);
    }

    #[test]
    fn wire_shape_omits_default_metadata() {
        let result = SearchResult::from_annotated(annotated(1, "내용", 0.5));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["metadata"].get("expanded").is_none());
        assert!(json["metadata"].get("included_chunks").is_none());
        assert_eq!(json["document"]["type"], "policy");
    }

    #[test]
    fn expanded_metadata_round_trips() {
        let mut result = SearchResult::from_annotated(annotated(2, "내용", 0.5));
        result.metadata.expanded = true;
        result.metadata.included_chunks = vec![1, 2, 3];
        let json = serde_json::to_string(&result).unwrap();
        let back: SearchResult = serde_json::from_str(&json).unwrap();
        assert!(back.metadata.expanded);
        assert_eq!(back.metadata.included_chunks, vec![1, 2, 3]);
    }
}
