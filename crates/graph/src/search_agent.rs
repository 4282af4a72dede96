//! Search agent
//!
//! Preprocesses the query, short-circuits incomplete queries with
//! suggestions, relaxes the similarity threshold when a clause-number
//! filter is present, runs hybrid search, and reranks the results by
//! literal keyword match.

use std::sync::Arc;

use serde_json::json;

use policy_agent_config::constants::search as search_constants;
use policy_agent_core::RequestState;
use policy_agent_rag::{HybridSearch, HybridSearchOptions, QueryPreprocessor, Reranker};

/// Hybrid search agent.
pub struct SearchAgent {
    preprocessor: Arc<QueryPreprocessor>,
    hybrid: Arc<HybridSearch>,
    reranker: Reranker,
    limit: i64,
    max_tokens: usize,
    threshold: f64,
}

impl SearchAgent {
    pub fn new(preprocessor: Arc<QueryPreprocessor>, hybrid: Arc<HybridSearch>) -> Self {
        Self {
            preprocessor,
            hybrid,
            reranker: Reranker::new(),
            limit: search_constants::DEFAULT_LIMIT,
            max_tokens: search_constants::MAX_CONTEXT_TOKENS,
            threshold: search_constants::DEFAULT_THRESHOLD,
        }
    }

    pub async fn run(&self, state: &mut RequestState) {
        if state.query.is_empty() {
            tracing::warn!("empty search query");
            state.error = Some("검색 쿼리가 비어있습니다.".to_string());
            state.search_results = Vec::new();
            state.record_task_result(
                "search",
                json!({ "success": false, "error": "empty query" }),
            );
            return;
        }

        let preprocessed = self.preprocessor.preprocess(&state.query);

        if !preprocessed.is_complete {
            tracing::info!(suggestions = ?preprocessed.suggestions, "incomplete query");
            state.error = None;
            state.search_results = Vec::new();
            state.record_task_result(
                "search",
                json!({
                    "success": false,
                    "incomplete_query": true,
                    "suggestions": preprocessed.suggestions,
                }),
            );
            return;
        }

        // A clause filter already constrains recall, so similarity may relax.
        let threshold = if preprocessed.clause_number.is_some() {
            search_constants::CLAUSE_FILTER_THRESHOLD
        } else {
            self.threshold
        };
        if let Some(clause) = &preprocessed.clause_number {
            tracing::info!(%clause, threshold, "clause filter active");
        }

        let options = HybridSearchOptions {
            limit: self.limit,
            max_tokens: self.max_tokens,
            threshold,
            document_type: None,
            clause_number: preprocessed.clause_number.clone(),
            user_id: None,
        };
        let (results, total_tokens) = self.hybrid.search(&preprocessed.standardized, &options).await;

        // Rerank with the original query's expanded keywords so literal
        // matches rise above semantically-close noise.
        let results = if results.len() > 1 {
            self.reranker.rerank(results, &preprocessed.expanded_terms)
        } else {
            results
        };

        tracing::info!(count = results.len(), total_tokens, "search agent done");

        state.record_task_result(
            "search",
            json!({
                "success": true,
                "count": results.len(),
                "query": state.query,
                "total_tokens": total_tokens,
                "search_type": "hybrid",
                "preprocessing": {
                    "original_query": preprocessed.original,
                    "standardized_query": preprocessed.standardized,
                    "clause_number": preprocessed.clause_number,
                    "expanded_terms": preprocessed.expanded_terms,
                },
            }),
        );
        state.search_results = results;
        state.error = None;
    }
}
