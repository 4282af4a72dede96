//! In-memory chunk store
//!
//! Test double with the same ordering and filtering semantics as the
//! Postgres store: cosine similarity over stored embeddings, conjunctive
//! term matching for FTS, adjacency by `(document_id, chunk_index)`, and
//! the active-document filter.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;

use policy_agent_core::{AdjacentChunks, AnnotatedChunk, Chunk, DocumentInfo, ExpandDirection};

use crate::chunk_store::{ChunkStore, SearchFilters};
use crate::StoreError;

/// One stored chunk with its embedding and document annotation.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub document: DocumentInfo,
    pub active: bool,
}

/// In-memory store for tests and offline runs.
#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, stored: StoredChunk) {
        self.chunks.write().push(stored);
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    fn matches_filters(stored: &StoredChunk, filters: &SearchFilters) -> bool {
        if !stored.active {
            return false;
        }
        if let Some(document_type) = &filters.document_type {
            if stored.document.document_type.as_deref() != Some(document_type.as_str()) {
                return false;
            }
        }
        if let Some(clause_number) = &filters.clause_number {
            if stored.chunk.clause_number.as_deref() != Some(clause_number.as_str()) {
                return false;
            }
        }
        true
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn search_vectors(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: i64,
        filters: &SearchFilters,
    ) -> Result<Vec<AnnotatedChunk>, StoreError> {
        let chunks = self.chunks.read();
        let mut scored: Vec<AnnotatedChunk> = chunks
            .iter()
            .filter(|stored| Self::matches_filters(stored, filters))
            .filter_map(|stored| {
                let similarity = cosine_similarity(embedding, &stored.embedding);
                (similarity > threshold).then(|| AnnotatedChunk {
                    chunk: stored.chunk.clone(),
                    document: stored.document.clone(),
                    score: similarity,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit.max(0) as usize);
        Ok(scored)
    }

    async fn fts_search(
        &self,
        tsquery: &str,
        limit: i64,
        filters: &SearchFilters,
    ) -> Result<Vec<AnnotatedChunk>, StoreError> {
        let terms: Vec<&str> = tsquery
            .split('&')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.chunks.read();
        let mut scored: Vec<AnnotatedChunk> = chunks
            .iter()
            .filter(|stored| Self::matches_filters(stored, filters))
            .filter_map(|stored| {
                // AND semantics: every term must occur.
                if !terms.iter().all(|t| stored.chunk.content.contains(t)) {
                    return None;
                }
                let occurrences: usize = terms
                    .iter()
                    .map(|t| stored.chunk.content.matches(t).count())
                    .sum();
                Some(AnnotatedChunk {
                    chunk: stored.chunk.clone(),
                    document: stored.document.clone(),
                    // ts_rank-scale score
                    score: 0.1 * occurrences as f64,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit.max(0) as usize);
        Ok(scored)
    }

    async fn get_adjacent(
        &self,
        chunk_id: i64,
        direction: ExpandDirection,
        limit: i64,
    ) -> Result<AdjacentChunks, StoreError> {
        let chunks = self.chunks.read();
        let Some(pivot) = chunks.iter().find(|s| s.chunk.chunk_id == chunk_id) else {
            return Ok(AdjacentChunks::default());
        };
        let document_id = pivot.chunk.document_id;
        let chunk_index = pivot.chunk.chunk_index;
        let limit = limit.max(0) as usize;

        let mut adjacent = AdjacentChunks::default();

        if matches!(direction, ExpandDirection::Prev | ExpandDirection::Both) {
            let mut prev: Vec<&StoredChunk> = chunks
                .iter()
                .filter(|s| {
                    s.active
                        && s.chunk.document_id == document_id
                        && s.chunk.chunk_index < chunk_index
                })
                .collect();
            prev.sort_by_key(|s| std::cmp::Reverse(s.chunk.chunk_index));
            prev.truncate(limit);
            prev.reverse();
            adjacent.prev = prev
                .into_iter()
                .map(|s| AnnotatedChunk {
                    chunk: s.chunk.clone(),
                    document: s.document.clone(),
                    score: 1.0,
                })
                .collect();
        }

        if matches!(direction, ExpandDirection::Next | ExpandDirection::Both) {
            let mut next: Vec<&StoredChunk> = chunks
                .iter()
                .filter(|s| {
                    s.active
                        && s.chunk.document_id == document_id
                        && s.chunk.chunk_index > chunk_index
                })
                .collect();
            next.sort_by_key(|s| s.chunk.chunk_index);
            next.truncate(limit);
            adjacent.next = next
                .into_iter()
                .map(|s| AnnotatedChunk {
                    chunk: s.chunk.clone(),
                    document: s.document.clone(),
                    score: 1.0,
                })
                .collect();
        }

        Ok(adjacent)
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<AnnotatedChunk>, StoreError> {
        let chunks = self.chunks.read();
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        let mut found: Vec<&StoredChunk> = chunks
            .iter()
            .filter(|s| wanted.contains(&s.chunk.chunk_id))
            .collect();
        found.sort_by_key(|s| (s.chunk.document_id, s.chunk.chunk_index));
        Ok(found
            .into_iter()
            .map(|s| AnnotatedChunk {
                chunk: s.chunk.clone(),
                document: s.document.clone(),
                score: 1.0,
            })
            .collect())
    }

    async fn clause_numbers_exist(
        &self,
        clauses: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        let chunks = self.chunks.read();
        let wanted: HashSet<&str> = clauses.iter().map(String::as_str).collect();
        Ok(chunks
            .iter()
            .filter(|s| s.active)
            .filter_map(|s| s.chunk.clause_number.as_deref())
            .filter(|c| wanted.contains(c))
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_agent_core::ChunkType;
    use std::collections::HashMap;

    fn stored(chunk_id: i64, chunk_index: i32, content: &str) -> StoredChunk {
        StoredChunk {
            chunk: Chunk {
                chunk_id,
                document_id: 1,
                chunk_index,
                content: content.to_string(),
                chunk_type: ChunkType::Text,
                token_count: Some(content.chars().count() as i32),
                page_number: None,
                section_title: None,
                clause_number: Some(format!("제{}조", chunk_index)),
                metadata: HashMap::new(),
            },
            embedding: vec![chunk_id as f32, 1.0, 0.0],
            document: DocumentInfo {
                filename: Some("약관.pdf".to_string()),
                document_type: Some("policy".to_string()),
                company_name: None,
            },
            active: true,
        }
    }

    #[tokio::test]
    async fn vector_search_orders_by_similarity() {
        let store = MemoryChunkStore::new();
        store.insert(stored(1, 1, "가"));
        store.insert(stored(5, 2, "나"));

        let results = store
            .search_vectors(&[5.0, 1.0, 0.0], 0.5, 10, &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(results[0].chunk.chunk_id, 5);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn fts_requires_all_terms() {
        let store = MemoryChunkStore::new();
        store.insert(stored(1, 1, "호스피스 신청 절차"));
        store.insert(stored(2, 2, "호스피스 안내"));

        let results = store
            .fts_search("호스피스 & 신청", 10, &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.chunk_id, 1);
    }

    #[tokio::test]
    async fn adjacency_is_ordered_and_bounded() {
        let store = MemoryChunkStore::new();
        for i in 1..=5 {
            store.insert(stored(i, i as i32, "내용"));
        }

        let adjacent = store.get_adjacent(3, ExpandDirection::Both, 2).await.unwrap();
        let prev: Vec<i32> = adjacent.prev.iter().map(|c| c.chunk.chunk_index).collect();
        let next: Vec<i32> = adjacent.next.iter().map(|c| c.chunk.chunk_index).collect();
        assert_eq!(prev, vec![1, 2]);
        assert_eq!(next, vec![4, 5]);
    }

    #[tokio::test]
    async fn clause_filter_and_existence() {
        let store = MemoryChunkStore::new();
        store.insert(stored(1, 15, "제15조 내용"));
        store.insert(stored(2, 16, "제16조 내용"));

        let filters = SearchFilters::clause(Some("제15조".to_string()));
        let results = store
            .search_vectors(&[1.0, 1.0, 0.0], 0.1, 10, &filters)
            .await
            .unwrap();
        assert!(results.iter().all(|c| c.chunk.clause_number.as_deref() == Some("제15조")));

        let existing = store
            .clause_numbers_exist(&["제15조".to_string(), "제99조".to_string()])
            .await
            .unwrap();
        assert!(existing.contains("제15조"));
        assert!(!existing.contains("제99조"));
    }

    #[tokio::test]
    async fn get_by_ids_returns_document_order() {
        let store = MemoryChunkStore::new();
        store.insert(stored(3, 3, "셋"));
        store.insert(stored(1, 1, "하나"));
        store.insert(stored(2, 2, "둘"));

        let chunks = store.get_by_ids(&[3, 1]).await.unwrap();
        let ids: Vec<i64> = chunks.iter().map(|c| c.chunk.chunk_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn inactive_documents_are_invisible() {
        let store = MemoryChunkStore::new();
        let mut hidden = stored(1, 1, "숨김 내용");
        hidden.active = false;
        store.insert(hidden);

        let results = store
            .search_vectors(&[1.0, 1.0, 0.0], 0.0, 10, &SearchFilters::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
