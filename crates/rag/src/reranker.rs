//! Lexical reranking
//!
//! Promotes chunks that literally contain the user's noun keywords, against
//! the lost-in-the-middle failure where semantically close but literally
//! off-topic chunks outrank literal hits.
//!
//! `rerank_score = similarity + 0.3·exact + 0.1·partial + 0.05·front`

use policy_agent_config::constants::rerank;
use policy_agent_core::SearchResult;

/// Keyword match re-scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reranker;

impl Reranker {
    pub fn new() -> Self {
        Self
    }

    /// Fraction-based keyword match score for one content string.
    pub fn match_score(&self, content: &str, keywords: &[String]) -> f64 {
        if keywords.is_empty() || content.is_empty() {
            return 0.0;
        }

        let content_lower = content.to_lowercase();
        let front: String = content_lower.chars().take(rerank::FRONT_WINDOW_CHARS).collect();

        let mut exact = 0usize;
        let mut front_hits = 0usize;
        let mut partial = 0.0f64;

        for keyword in keywords {
            let keyword_lower = keyword.to_lowercase();
            if content_lower.contains(&keyword_lower) {
                exact += 1;
                if front.contains(&keyword_lower) {
                    front_hits += 1;
                }
            } else if keyword_lower.chars().count() >= 4 {
                // Long keywords score half credit when either half appears:
                // "초간편고지" still matches "간편" or "고지" text.
                let chars: Vec<char> = keyword_lower.chars().collect();
                let mid = chars.len() / 2;
                let head: String = chars[..mid].iter().collect();
                let tail: String = chars[mid..].iter().collect();
                if content_lower.contains(&head) || content_lower.contains(&tail) {
                    partial += 0.5;
                }
            }
        }

        let total = keywords.len() as f64;
        let exact_ratio = exact as f64 / total;
        let partial_ratio = partial / total;
        let front_ratio = if exact > 0 { front_hits as f64 / total } else { 0.0 };

        exact_ratio * rerank::EXACT_MATCH_WEIGHT
            + partial_ratio * rerank::PARTIAL_MATCH_WEIGHT
            + front_ratio * rerank::POSITION_BONUS_WEIGHT
    }

    /// Re-order results by `similarity + match_score`, keeping the original
    /// rank on each record for observability.
    pub fn rerank(&self, results: Vec<SearchResult>, keywords: &[String]) -> Vec<SearchResult> {
        if results.len() < 2 {
            return results;
        }

        let mut scored: Vec<SearchResult> = results
            .into_iter()
            .enumerate()
            .map(|(index, mut result)| {
                let exact_score = self.match_score(&result.content, keywords);
                result.metadata.rerank_exact_score = Some(exact_score);
                result.metadata.rerank_final_score = Some(result.similarity + exact_score);
                result.metadata.original_rank = Some(index + 1);
                result
            })
            .collect();

        scored.sort_by(|a, b| {
            let a_score = a.metadata.rerank_final_score.unwrap_or(a.similarity);
            let b_score = b.metadata.rerank_final_score.unwrap_or(b.similarity);
            b_score.total_cmp(&a_score)
        });

        tracing::debug!(count = scored.len(), "rerank done");
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_agent_core::{ChunkType, DocumentInfo, ResultMetadata};

    fn result(chunk_id: i64, content: &str, similarity: f64) -> SearchResult {
        SearchResult {
            chunk_id,
            document_id: 1,
            content: content.to_string(),
            similarity,
            chunk_type: ChunkType::Text,
            page_number: None,
            section_title: None,
            clause_number: None,
            metadata: ResultMetadata::default(),
            document: DocumentInfo::default(),
            token_count: None,
        }
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn literal_hit_overtakes_semantic_neighbor() {
        let results = vec![
            result(1, "일반적인 보장 내용 안내문입니다.", 0.80),
            result(2, "면책기간 중 보험금은 지급하지 않습니다.", 0.70),
        ];
        let reranked = Reranker::new().rerank(results, &keywords(&["면책기간", "보험금"]));

        assert_eq!(reranked[0].chunk_id, 2);
        assert_eq!(reranked[0].metadata.original_rank, Some(2));
        assert_eq!(reranked[1].metadata.original_rank, Some(1));
    }

    #[test]
    fn exact_score_counts_front_bonus() {
        let reranker = Reranker::new();
        let front = reranker.match_score("면책기간에 대한 설명.", &keywords(&["면책기간"]));
        let back_content = format!("{}면책기간", "가".repeat(300));
        let back = reranker.match_score(&back_content, &keywords(&["면책기간"]));
        assert!(front > back);
    }

    #[test]
    fn partial_match_scores_half() {
        let reranker = Reranker::new();
        let score = reranker.match_score("보장 기간에 대한 안내", &keywords(&["면책기간"]));
        // half of "면책기간" appears, 0.5 partial / 1 keyword * 0.1 weight
        assert!((score - 0.05).abs() < 1e-9);
    }

    #[test]
    fn empty_keywords_leave_order_alone() {
        let results = vec![result(1, "가", 0.9), result(2, "나", 0.8)];
        let reranked = Reranker::new().rerank(results, &[]);
        assert_eq!(reranked[0].chunk_id, 1);
    }

    #[test]
    fn single_result_passes_through_untouched() {
        let results = vec![result(1, "가", 0.9)];
        let reranked = Reranker::new().rerank(results, &keywords(&["가"]));
        assert!(reranked[0].metadata.original_rank.is_none());
    }
}
