//! Dense vector search
//!
//! Embeds the query (cache-through) and runs a cosine-similarity search
//! against active documents. Failures are logged and surface as an empty
//! list, so hybrid search continues with the keyword side.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use policy_agent_core::{SearchLogEntry, SearchResult, SearchType};
use policy_agent_store::{ChunkStore, SearchFilters, SearchLogSink};

use crate::embeddings::Embedder;

/// Per-call options.
#[derive(Debug, Clone)]
pub struct VectorSearchOptions {
    pub threshold: f64,
    pub limit: i64,
    pub document_type: Option<String>,
    pub clause_number: Option<String>,
    pub user_id: Option<i64>,
}

impl Default for VectorSearchOptions {
    fn default() -> Self {
        Self {
            threshold: policy_agent_config::constants::search::DEFAULT_THRESHOLD,
            limit: 10,
            document_type: None,
            clause_number: None,
            user_id: None,
        }
    }
}

/// Vector searcher over the chunk store.
pub struct VectorSearch {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    log_sink: Arc<dyn SearchLogSink>,
}

impl VectorSearch {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        log_sink: Arc<dyn SearchLogSink>,
    ) -> Self {
        Self { store, embedder, log_sink }
    }

    /// Search; never propagates an error to the caller.
    pub async fn search(&self, query: &str, options: &VectorSearchOptions) -> Vec<SearchResult> {
        let started = Instant::now();

        let embedding = self.embedder.embed(query).await;
        if embedding.iter().all(|v| *v == 0.0) {
            tracing::error!("query embedding is a zero vector, skipping vector search");
            return Vec::new();
        }

        let filters = SearchFilters {
            document_type: options.document_type.clone(),
            clause_number: options.clause_number.clone(),
        };

        let results = match self
            .store
            .search_vectors(&embedding, options.threshold, options.limit, &filters)
            .await
        {
            Ok(chunks) => chunks.into_iter().map(SearchResult::from_annotated).collect(),
            Err(e) => {
                tracing::error!(error = %e, "vector search failed");
                Vec::<SearchResult>::new()
            }
        };

        let response_time_ms = started.elapsed().as_millis() as u64;
        self.log_sink
            .log(&SearchLogEntry {
                user_id: options.user_id,
                query: query.to_string(),
                query_intent: None,
                search_type: SearchType::Vector,
                results_count: results.len(),
                top_similarity: results.first().map(|r| r.similarity).unwrap_or(0.0),
                response_time_ms,
                created_at: Utc::now(),
            })
            .await;

        tracing::info!(
            count = results.len(),
            response_time_ms,
            threshold = options.threshold,
            "vector search done"
        );

        results
    }
}
