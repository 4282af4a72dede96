//! Keyword (full-text) search
//!
//! Builds a conjunctive lexeme query from the extracted noun keywords
//! (`term1 & term2 & …`) and runs a ranked full-text search against the
//! chunk store. The `ts_rank` value lands in the similarity slot. Failures
//! surface as an empty list.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use policy_agent_core::SearchResult;
use policy_agent_store::{ChunkStore, SearchFilters};
use policy_agent_text::KeywordExtractor;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s가-힣]").unwrap_or_else(|e| panic!("{e}")));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap_or_else(|e| panic!("{e}")));

/// Full-text searcher over the chunk store.
pub struct KeywordSearch {
    store: Arc<dyn ChunkStore>,
    extractor: Arc<KeywordExtractor>,
}

impl KeywordSearch {
    pub fn new(store: Arc<dyn ChunkStore>, extractor: Arc<KeywordExtractor>) -> Self {
        Self { store, extractor }
    }

    /// Strip everything but word characters, whitespace, and Hangul.
    fn clean_query(query: &str) -> String {
        let cleaned = NON_WORD.replace_all(query, " ");
        WHITESPACE.replace_all(cleaned.trim(), " ").to_string()
    }

    /// Build the conjunctive tsquery string, `None` when no terms survive.
    pub fn build_tsquery(&self, query: &str) -> Option<String> {
        let clean = Self::clean_query(query);
        if clean.is_empty() {
            return None;
        }
        let keywords = self.extractor.extract(&clean);
        if keywords.is_empty() {
            return None;
        }
        let tsquery = keywords.join(" & ");
        tracing::debug!(%query, %tsquery, "tsquery built");
        Some(tsquery)
    }

    /// Search; never propagates an error to the caller.
    pub async fn search(
        &self,
        query: &str,
        limit: i64,
        document_type: Option<String>,
        clause_number: Option<String>,
    ) -> Vec<SearchResult> {
        let Some(tsquery) = self.build_tsquery(query) else {
            tracing::warn!(%query, "no searchable terms, returning empty keyword results");
            return Vec::new();
        };

        let filters = SearchFilters { document_type, clause_number };
        match self.store.fts_search(&tsquery, limit, &filters).await {
            Ok(chunks) => {
                let results: Vec<SearchResult> =
                    chunks.into_iter().map(SearchResult::from_annotated).collect();
                tracing::info!(count = results.len(), "keyword search done");
                results
            }
            Err(e) => {
                tracing::error!(error = %e, "keyword search failed");
                Vec::new()
            }
        }
    }
}
