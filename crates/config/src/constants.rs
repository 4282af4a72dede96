//! Centralized tuning constants
//!
//! Single source of truth for search, expansion, and validation parameters.
//! Business content (spacing rules, synonyms, suggestion text) lives in the
//! terms dictionary, not here.

/// Retrieval tuning.
pub mod search {
    /// RRF parameter (standard value from Cormack et al. 2009).
    pub const RRF_K: u32 = 60;

    /// Default cosine-similarity threshold for vector search.
    pub const DEFAULT_THRESHOLD: f64 = 0.7;

    /// Relaxed threshold used when a clause-number filter already
    /// constrains recall.
    pub const CLAUSE_FILTER_THRESHOLD: f64 = 0.3;

    /// Default number of fused results returned by hybrid search.
    pub const DEFAULT_LIMIT: i64 = 5;

    /// Context assembly budget in cl100k tokens.
    pub const MAX_CONTEXT_TOKENS: usize = 20_000;
}

/// Context-judgement / expansion tuning.
pub mod expansion {
    /// Maximum judge→expand round trips per request.
    pub const MAX_EXPANSION_COUNT: u32 = 3;

    /// Token ceiling applied from the second judge pass onward.
    pub const SECOND_PASS_TOKEN_CEILING: usize = 10_000;

    /// Token budget for a single expansion pass.
    pub const MAX_EXPANSION_TOKENS: usize = 15_000;

    /// Adjacent chunks fetched per direction.
    pub const ADJACENT_LIMIT: i64 = 2;

    /// Minimum fraction of expanded terms a chunk must contain literally
    /// for expansion to be worthwhile.
    pub const MIN_RELEVANCE: f64 = 0.3;
}

/// Answer generation / validation tuning.
pub mod answer {
    /// Generation attempts (first try + regenerations).
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Validation axis weights. Must sum to 1.0.
    pub const WEIGHT_HALLUCINATION: f64 = 0.4;
    pub const WEIGHT_CONTEXT: f64 = 0.3;
    pub const WEIGHT_CLAUSE: f64 = 0.2;
    pub const WEIGHT_FORMAT: f64 = 0.1;

    /// Context-overlap pass threshold.
    pub const CONTEXT_MATCH_THRESHOLD: f64 = 0.7;

    /// Clause-existence pass threshold.
    pub const CLAUSE_EXISTENCE_THRESHOLD: f64 = 0.8;

    /// Source bundle cap (chars) for the hallucination prompt.
    pub const VALIDATION_CONTEXT_CHARS: usize = 1000;
}

/// Reranker score weights.
pub mod rerank {
    pub const EXACT_MATCH_WEIGHT: f64 = 0.3;
    pub const PARTIAL_MATCH_WEIGHT: f64 = 0.1;
    pub const POSITION_BONUS_WEIGHT: f64 = 0.05;

    /// Window (chars) counted as the front of a chunk for the position bonus.
    pub const FRONT_WINDOW_CHARS: usize = 200;
}

/// Cache tuning.
pub mod cache {
    pub const DEFAULT_TTL_SECS: u64 = 3600;
    pub const MEMORY_MAX_ENTRIES: usize = 10_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_weights_sum_to_one() {
        let sum = answer::WEIGHT_HALLUCINATION
            + answer::WEIGHT_CONTEXT
            + answer::WEIGHT_CLAUSE
            + answer::WEIGHT_FORMAT;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
