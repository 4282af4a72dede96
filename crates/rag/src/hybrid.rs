//! Hybrid search orchestration
//!
//! Runs vector and keyword search concurrently (separate pool connections),
//! fuses the rankings with RRF, reuses the already-fetched records for the
//! fused ids instead of re-querying storage, applies the token budget, and
//! emits one structured search-log entry.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use policy_agent_config::constants::search as search_constants;
use policy_agent_core::{SearchLogEntry, SearchResult, SearchType};
use policy_agent_store::SearchLogSink;
use policy_agent_text::TokenCounter;

use crate::fusion::{optimize_context, reciprocal_rank_fusion};
use crate::keyword_search::KeywordSearch;
use crate::vector_search::{VectorSearch, VectorSearchOptions};

/// Per-call options.
#[derive(Debug, Clone)]
pub struct HybridSearchOptions {
    pub limit: i64,
    pub max_tokens: usize,
    pub threshold: f64,
    pub document_type: Option<String>,
    pub clause_number: Option<String>,
    pub user_id: Option<i64>,
}

impl Default for HybridSearchOptions {
    fn default() -> Self {
        Self {
            limit: search_constants::DEFAULT_LIMIT,
            max_tokens: search_constants::MAX_CONTEXT_TOKENS,
            threshold: search_constants::DEFAULT_THRESHOLD,
            document_type: None,
            clause_number: None,
            user_id: None,
        }
    }
}

/// Hybrid (dense + lexical) searcher.
pub struct HybridSearch {
    vector: VectorSearch,
    keyword: KeywordSearch,
    log_sink: Arc<dyn SearchLogSink>,
    tokens: TokenCounter,
}

impl HybridSearch {
    pub fn new(
        vector: VectorSearch,
        keyword: KeywordSearch,
        log_sink: Arc<dyn SearchLogSink>,
    ) -> Self {
        Self { vector, keyword, log_sink, tokens: TokenCounter::new() }
    }

    /// End-to-end hybrid search. Returns the token-bounded results and
    /// their total token count.
    pub async fn search(
        &self,
        query: &str,
        options: &HybridSearchOptions,
    ) -> (Vec<SearchResult>, usize) {
        let started = Instant::now();
        let fetch_limit = options.limit * 2;

        tracing::info!(
            query = %truncate(query, 50),
            limit = options.limit,
            threshold = options.threshold,
            "hybrid search start"
        );

        // Both retrievers over-fetch so fusion has room to disagree.
        let vector_options = VectorSearchOptions {
            threshold: options.threshold,
            limit: fetch_limit,
            document_type: options.document_type.clone(),
            clause_number: options.clause_number.clone(),
            user_id: options.user_id,
        };
        let (vector_results, keyword_results) = tokio::join!(
            self.vector.search(query, &vector_options),
            self.keyword.search(
                query,
                fetch_limit,
                options.document_type.clone(),
                options.clause_number.clone(),
            ),
        );

        if vector_results.is_empty() && keyword_results.is_empty() {
            tracing::warn!("both retrievers empty");
            self.log(query, &[], started, options.user_id).await;
            return (Vec::new(), 0);
        }

        let fused = reciprocal_rank_fusion(&vector_results, &keyword_results, search_constants::RRF_K);

        // Reuse already-fetched records; first occurrence wins (vector side
        // first), no storage re-query.
        let mut cache: std::collections::HashMap<i64, SearchResult> = std::collections::HashMap::new();
        for result in vector_results.into_iter().chain(keyword_results) {
            cache.entry(result.chunk_id).or_insert(result);
        }

        let merged: Vec<SearchResult> = fused
            .iter()
            .take(options.limit.max(0) as usize)
            .filter_map(|(chunk_id, rrf_score)| {
                cache.remove(chunk_id).map(|mut result| {
                    result.similarity = *rrf_score;
                    result
                })
            })
            .collect();

        let counter = self.tokens;
        let (optimized, total_tokens) =
            optimize_context(merged, options.max_tokens, move |text| counter.count(text));

        self.log(query, &optimized, started, options.user_id).await;

        tracing::info!(
            count = optimized.len(),
            total_tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "hybrid search done"
        );

        (optimized, total_tokens)
    }

    async fn log(
        &self,
        query: &str,
        results: &[SearchResult],
        started: Instant,
        user_id: Option<i64>,
    ) {
        self.log_sink
            .log(&SearchLogEntry {
                user_id,
                query: query.to_string(),
                query_intent: Some("search".to_string()),
                search_type: SearchType::Hybrid,
                results_count: results.len(),
                top_similarity: results.first().map(|r| r.similarity).unwrap_or(0.0),
                response_time_ms: started.elapsed().as_millis() as u64,
                created_at: Utc::now(),
            })
            .await;
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::Embedder;
    use async_trait::async_trait;
    use policy_agent_core::{Chunk, ChunkType, DocumentInfo};
    use policy_agent_store::{MemoryChunkStore, MemorySearchLogSink, StoredChunk};
    use policy_agent_text::KeywordExtractor;
    use std::collections::{HashMap, HashSet};

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Vec<f32> {
            self.0.clone()
        }
        async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
            texts.iter().map(|_| self.0.clone()).collect()
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn stored(chunk_id: i64, content: &str, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            chunk: Chunk {
                chunk_id,
                document_id: 1,
                chunk_index: chunk_id as i32,
                content: content.to_string(),
                chunk_type: ChunkType::Text,
                token_count: Some(20),
                page_number: None,
                section_title: None,
                clause_number: None,
                metadata: HashMap::new(),
            },
            embedding,
            document: DocumentInfo::default(),
            active: true,
        }
    }

    fn hybrid(store: Arc<MemoryChunkStore>, sink: Arc<MemorySearchLogSink>) -> HybridSearch {
        let extractor = Arc::new(KeywordExtractor::new());
        let vector = VectorSearch::new(
            store.clone(),
            Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
            Arc::new(policy_agent_store::NullSearchLogSink),
        );
        let keyword = KeywordSearch::new(store, extractor);
        HybridSearch::new(vector, keyword, sink)
    }

    #[tokio::test]
    async fn results_are_deduplicated_and_ordered() {
        let store = Arc::new(MemoryChunkStore::new());
        // Chunk 1 is close in embedding space AND a literal keyword hit.
        store.insert(stored(1, "보험금 지급 절차 설명", vec![1.0, 0.05, 0.0]));
        store.insert(stored(2, "무관한 내용", vec![0.95, 0.2, 0.0]));
        store.insert(stored(3, "보험금 지급 기한", vec![0.1, 1.0, 0.0]));
        let sink = Arc::new(MemorySearchLogSink::new());

        let (results, total_tokens) = hybrid(store, sink.clone())
            .search("보험금 지급", &HybridSearchOptions { threshold: 0.5, ..Default::default() })
            .await;

        assert!(!results.is_empty());
        assert_eq!(results[0].chunk_id, 1);
        assert!(total_tokens > 0);

        let ids: Vec<i64> = results.iter().map(|r| r.chunk_id).collect();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len(), "duplicate chunk ids: {:?}", ids);
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].search_type, SearchType::Hybrid);
    }

    #[tokio::test]
    async fn empty_both_sides_short_circuits() {
        let store = Arc::new(MemoryChunkStore::new());
        let sink = Arc::new(MemorySearchLogSink::new());
        let (results, total_tokens) = hybrid(store, sink)
            .search("존재하지 않는 내용", &HybridSearchOptions::default())
            .await;
        assert!(results.is_empty());
        assert_eq!(total_tokens, 0);
    }
}
