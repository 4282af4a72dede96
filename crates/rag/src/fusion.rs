//! Rank fusion and context assembly
//!
//! Reciprocal Rank Fusion over the vector and keyword result lists, and a
//! greedy token-budget filter for the fused context.

use std::collections::HashMap;

use policy_agent_core::SearchResult;

/// Reciprocal Rank Fusion.
///
/// Each result at 0-indexed rank `r` contributes `1 / (k + r + 1)`.
/// A chunk appearing in both lists sums its contributions: that is the
/// "endorsed by both retrievers" signal, not an accident.
///
/// Returns `(chunk_id, rrf_score)` pairs in non-increasing score order.
pub fn reciprocal_rank_fusion(
    vector_results: &[SearchResult],
    keyword_results: &[SearchResult],
    k: u32,
) -> Vec<(i64, f64)> {
    let mut scores: HashMap<i64, f64> = HashMap::new();

    for (rank, result) in vector_results.iter().enumerate() {
        *scores.entry(result.chunk_id).or_insert(0.0) += 1.0 / (k as f64 + rank as f64 + 1.0);
    }
    for (rank, result) in keyword_results.iter().enumerate() {
        *scores.entry(result.chunk_id).or_insert(0.0) += 1.0 / (k as f64 + rank as f64 + 1.0);
    }

    let mut fused: Vec<(i64, f64)> = scores.into_iter().collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    tracing::debug!(
        vector = vector_results.len(),
        keyword = keyword_results.len(),
        fused = fused.len(),
        k,
        "RRF fusion done"
    );

    fused
}

/// Greedily include results until the token budget would be exceeded.
///
/// Ordering is preserved; this is a prefix filter, not a re-sort. Token
/// counts come from the stored `token_count` when present, otherwise from
/// `count`.
pub fn optimize_context(
    results: Vec<SearchResult>,
    max_tokens: usize,
    count: impl Fn(&str) -> usize,
) -> (Vec<SearchResult>, usize) {
    let mut included = Vec::new();
    let mut total_tokens = 0usize;

    for result in results {
        let tokens = match result.token_count {
            Some(n) if !result.metadata.expanded => n.max(0) as usize,
            _ => count(&result.content),
        };
        if total_tokens + tokens > max_tokens {
            tracing::debug!(total_tokens, max_tokens, next = tokens, "token budget reached");
            break;
        }
        total_tokens += tokens;
        included.push(result);
    }

    (included, total_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_agent_core::{ChunkType, DocumentInfo, ResultMetadata};

    fn result(chunk_id: i64, tokens: i32) -> SearchResult {
        SearchResult {
            chunk_id,
            document_id: 1,
            content: "내용".repeat(tokens.max(0) as usize),
            similarity: 0.5,
            chunk_type: ChunkType::Text,
            page_number: None,
            section_title: None,
            clause_number: None,
            metadata: ResultMetadata::default(),
            document: DocumentInfo::default(),
            token_count: Some(tokens),
        }
    }

    #[test]
    fn duplicates_sum_contributions() {
        let vector = vec![result(1, 10), result(2, 10)];
        let keyword = vec![result(2, 10), result(3, 10)];
        let fused = reciprocal_rank_fusion(&vector, &keyword, 60);

        assert_eq!(fused.len(), 3);
        // chunk 2 appears in both lists and must rank first.
        assert_eq!(fused[0].0, 2);
        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((fused[0].1 - expected).abs() < 1e-12);
    }

    #[test]
    fn disjoint_lists_are_symmetric() {
        let a = vec![result(1, 10)];
        let b = vec![result(2, 10)];
        let ab = reciprocal_rank_fusion(&a, &b, 60);
        let ba = reciprocal_rank_fusion(&b, &a, 60);

        let mut ab_sorted = ab.clone();
        ab_sorted.sort_by_key(|(id, _)| *id);
        let mut ba_sorted = ba;
        ba_sorted.sort_by_key(|(id, _)| *id);
        for (x, y) in ab_sorted.iter().zip(&ba_sorted) {
            assert_eq!(x.0, y.0);
            assert!((x.1 - y.1).abs() < 1e-12);
        }
        assert!(ab.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn context_budget_is_a_prefix_filter() {
        let results = vec![result(1, 100), result(2, 100), result(3, 100)];
        let (included, total) = optimize_context(results, 250, |_| 0);
        assert_eq!(included.len(), 2);
        assert_eq!(total, 200);
        assert_eq!(included[0].chunk_id, 1);
        assert_eq!(included[1].chunk_id, 2);
    }

    #[test]
    fn optimizer_is_idempotent() {
        let results = vec![result(1, 50), result(2, 50)];
        let (first, total_first) = optimize_context(results, 1000, |_| 0);
        let (second, total_second) = optimize_context(first.clone(), 1000, |_| 0);
        assert_eq!(first.len(), second.len());
        assert_eq!(total_first, total_second);
    }

    #[test]
    fn oversized_first_result_yields_empty_context() {
        let results = vec![result(1, 1000)];
        let (included, total) = optimize_context(results, 100, |_| 0);
        assert!(included.is_empty());
        assert_eq!(total, 0);
    }
}
