//! Context judgement
//!
//! Decides whether the retrieved chunks form a structurally complete
//! answer context, and which chunks to expand in which direction when not.
//! Combines rule-based structure analysis with an LLM sufficiency check;
//! the judge↔expand cycle is bounded by `MAX_EXPANSION_COUNT` and a token
//! ceiling on later passes.

use std::sync::Arc;

use serde_json::json;

use policy_agent_config::constants::expansion as expansion_constants;
use policy_agent_core::{ExpandDirection, ExpandRequest, RequestState, SearchResult};
use policy_agent_llm::LlmClient;
use policy_agent_text::{Completeness, StructureAnalyzer, TokenCounter};

/// Parsed LLM sufficiency verdict.
#[derive(Debug, Clone)]
pub struct LlmSufficiency {
    pub is_sufficient: bool,
    pub missing_info: String,
    /// Chunk ids (already resolved from 1-based indices).
    pub chunks_to_expand: Vec<i64>,
    pub explanation: String,
}

impl LlmSufficiency {
    /// Conservative default: sufficient, so a broken LLM can never cause
    /// an expansion loop.
    fn sufficient_fallback(reason: impl Into<String>) -> Self {
        Self {
            is_sufficient: true,
            missing_info: "판단 불가".to_string(),
            chunks_to_expand: Vec::new(),
            explanation: reason.into(),
        }
    }
}

/// Context sufficiency judge.
pub struct ContextJudge {
    llm: Arc<dyn LlmClient>,
    analyzer: StructureAnalyzer,
    tokens: TokenCounter,
}

impl ContextJudge {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            analyzer: StructureAnalyzer::new(),
            tokens: TokenCounter::new(),
        }
    }

    /// Judge the current context; fills `context_sufficient` and
    /// `chunks_to_expand` on the state.
    pub async fn judge(&self, state: &mut RequestState) {
        let expansion_count = state.expansion_count;
        let expanded_terms = self.expanded_terms(state);
        let counter = self.tokens;
        let current_tokens = state.context_tokens(|text| counter.count(text));

        tracing::info!(
            results = state.search_results.len(),
            expansion_count,
            current_tokens,
            terms = expanded_terms.len(),
            "context judgement start"
        );

        // Nothing retrieved: there is nothing to improve by expanding.
        if state.search_results.is_empty() {
            state.context_sufficient = Some(true);
            state.chunks_to_expand = Vec::new();
            state.record_task_result(
                "context_judgement",
                json!({ "success": true, "sufficient": true, "reason": "no search results" }),
            );
            return;
        }

        if expansion_count >= expansion_constants::MAX_EXPANSION_COUNT {
            tracing::info!(expansion_count, "max expansion count reached, forcing sufficient");
            state.context_sufficient = Some(true);
            state.chunks_to_expand = Vec::new();
            state.record_task_result(
                "context_judgement",
                json!({
                    "success": true,
                    "sufficient": true,
                    "reason": "max expansion count",
                    "expansion_count": expansion_count,
                }),
            );
            return;
        }

        if expansion_count >= 1 && current_tokens > expansion_constants::SECOND_PASS_TOKEN_CEILING {
            tracing::warn!(current_tokens, "token ceiling exceeded, forcing sufficient");
            state.context_sufficient = Some(true);
            state.chunks_to_expand = Vec::new();
            state.record_task_result(
                "context_judgement",
                json!({
                    "success": true,
                    "sufficient": true,
                    "reason": "token ceiling",
                    "current_tokens": current_tokens,
                }),
            );
            return;
        }

        // Later passes trust only the LLM and expand at most one chunk,
        // forced forward. This is a convergence safeguard, preserved as-is.
        if expansion_count >= 1 {
            let llm_check = self.llm_sufficiency_check(&state.query, &state.search_results).await;
            let requests: Vec<ExpandRequest> = if llm_check.is_sufficient {
                Vec::new()
            } else {
                llm_check
                    .chunks_to_expand
                    .iter()
                    .take(1)
                    .map(|chunk_id| ExpandRequest {
                        chunk_id: *chunk_id,
                        direction: ExpandDirection::Next,
                        reasons: vec!["LLM 판단".to_string()],
                    })
                    .collect()
            };

            state.record_task_result(
                "context_judgement",
                json!({
                    "success": true,
                    "sufficient": requests.is_empty(),
                    "llm_check": {
                        "is_sufficient": llm_check.is_sufficient,
                        "missing_info": llm_check.missing_info,
                        "explanation": llm_check.explanation,
                    },
                    "expansion_count": expansion_count,
                    "current_tokens": current_tokens,
                }),
            );
            state.context_sufficient = Some(requests.is_empty());
            state.chunks_to_expand = requests;
            return;
        }

        // First pass: structural completeness with a relevance gate.
        let mut requests: Vec<ExpandRequest> = Vec::new();
        for result in &state.search_results {
            if result.metadata.expanded {
                tracing::debug!(chunk_id = result.chunk_id, "already expanded, skipped");
                continue;
            }

            let completeness = self.analyzer.check_completeness(&result.content);
            if completeness.is_complete {
                continue;
            }

            if !self.is_relevant(&expanded_terms, &result.content) {
                tracing::info!(
                    chunk_id = result.chunk_id,
                    "incomplete but not germane, expansion suppressed"
                );
                continue;
            }

            let direction = Self::refine_direction(&completeness);
            tracing::info!(
                chunk_id = result.chunk_id,
                ?direction,
                reasons = ?completeness.reasons,
                "expansion candidate"
            );
            requests.push(ExpandRequest {
                chunk_id: result.chunk_id,
                direction,
                reasons: completeness.reasons.clone(),
            });
        }

        let llm_check = self.llm_sufficiency_check(&state.query, &state.search_results).await;
        for chunk_id in &llm_check.chunks_to_expand {
            if !requests.iter().any(|r| r.chunk_id == *chunk_id) {
                requests.push(ExpandRequest {
                    chunk_id: *chunk_id,
                    direction: ExpandDirection::Both,
                    reasons: vec!["LLM 판단".to_string()],
                });
            }
        }

        let is_sufficient = requests.is_empty() && llm_check.is_sufficient;

        tracing::info!(
            is_sufficient,
            expansion_candidates = requests.len(),
            "context judgement done"
        );

        state.record_task_result(
            "context_judgement",
            json!({
                "success": true,
                "sufficient": is_sufficient,
                "chunks_to_expand": requests.iter().map(|r| r.chunk_id).collect::<Vec<_>>(),
                "llm_check": {
                    "is_sufficient": llm_check.is_sufficient,
                    "missing_info": llm_check.missing_info,
                    "explanation": llm_check.explanation,
                },
                "expansion_count": expansion_count,
            }),
        );
        state.context_sufficient = Some(is_sufficient);
        state.chunks_to_expand = if is_sufficient { Vec::new() } else { requests };
    }

    /// Expanded keywords recorded by the search agent; falls back to a
    /// plain word split of the query.
    fn expanded_terms(&self, state: &RequestState) -> Vec<String> {
        let recorded = state
            .task_results
            .get("search")
            .and_then(|search| search.get("preprocessing"))
            .and_then(|preprocessing| preprocessing.get("expanded_terms"))
            .and_then(|terms| terms.as_array())
            .map(|terms| {
                terms
                    .iter()
                    .filter_map(|t| t.as_str().map(String::from))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if !recorded.is_empty() {
            return recorded;
        }

        tracing::warn!("no preprocessing record, falling back to word split");
        state
            .query
            .split_whitespace()
            .filter(|w| w.chars().count() >= 2)
            .map(String::from)
            .collect()
    }

    /// Relevance gate: the chunk must literally contain at least 30% of
    /// the expanded terms, otherwise it is incomplete but not germane.
    fn is_relevant(&self, expanded_terms: &[String], content: &str) -> bool {
        if expanded_terms.is_empty() {
            return true;
        }
        let content_lower = content.to_lowercase();
        let matched = expanded_terms
            .iter()
            .filter(|term| content_lower.contains(&term.to_lowercase()))
            .count();
        let relevance = matched as f64 / expanded_terms.len() as f64;
        tracing::debug!(matched, total = expanded_terms.len(), relevance, "relevance gate");
        relevance >= expansion_constants::MIN_RELEVANCE
    }

    /// Direction refinement when structure says `both`: expand only toward
    /// the side with issues; when both sides have issues the relevant
    /// content is usually toward the tail of the chunk, so go forward.
    fn refine_direction(completeness: &Completeness) -> ExpandDirection {
        match completeness.direction {
            Some(ExpandDirection::Both) => {
                let front = !completeness.front_issues.is_empty();
                let back = !completeness.back_issues.is_empty();
                match (front, back) {
                    (true, false) => ExpandDirection::Prev,
                    (false, true) => ExpandDirection::Next,
                    _ => ExpandDirection::Next,
                }
            }
            Some(direction) => direction,
            None => ExpandDirection::Next,
        }
    }

    /// Ask the model whether the chunks suffice to answer the query.
    /// Any parse or API failure defaults to sufficient.
    pub async fn llm_sufficiency_check(
        &self,
        query: &str,
        results: &[SearchResult],
    ) -> LlmSufficiency {
        let chunk_ids: Vec<i64> = results.iter().map(|r| r.chunk_id).collect();
        let context = results
            .iter()
            .enumerate()
            .map(|(index, r)| format!("[청크 {} (ID: {})]:\n{}", index + 1, r.chunk_id, r.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "다음 질문에 답변하기 위해 제공된 컨텍스트가 충분한지 판단해주세요.\n\n\
             질문: {query}\n\n\
             컨텍스트:\n{context}\n\n\
             다음 형식으로 답변하세요:\n\
             1. 충분성: [충분함 | 불충분함]\n\
             2. 누락 정보: [무엇이 필요한지 구체적으로 설명, 충분하면 \"없음\"]\n\
             3. 확장 필요 청크: [청크 번호들을 쉼표로 구분, 없으면 \"없음\"]\n\
             4. 설명: [판단 이유를 간단히]\n\n\
             중요: 청크의 내용이 잘려서 문맥이 불완전한 경우 \"불충분함\"으로 판단하세요."
        );

        let response = match self
            .llm
            .complete_validation("당신은 문서 컨텍스트의 충분성을 판단하는 전문가입니다.", &prompt)
            .await
        {
            Ok(completion) => completion.text,
            Err(e) => {
                tracing::error!(error = %e, "LLM sufficiency check failed, assuming sufficient");
                return LlmSufficiency::sufficient_fallback(format!("LLM 판단 오류: {e}"));
            }
        };

        Self::parse_sufficiency(&response, &chunk_ids)
    }

    /// Lenient parse of the four-line sufficiency response.
    fn parse_sufficiency(response: &str, chunk_ids: &[i64]) -> LlmSufficiency {
        let verdict_line = response
            .lines()
            .find(|line| line.contains("충분성") || line.contains("충분함"))
            .unwrap_or_else(|| response.lines().next().unwrap_or(""));
        let is_sufficient = if verdict_line.contains("불충분") {
            false
        } else {
            verdict_line.contains("충분")
        };

        let missing_info = response
            .lines()
            .find(|line| line.contains("누락"))
            .and_then(|line| line.splitn(2, ':').nth(1))
            .map(|rest| rest.trim().to_string())
            .unwrap_or_else(|| "없음".to_string());

        let chunks_to_expand: Vec<i64> = response
            .lines()
            .find(|line| line.contains("확장 필요"))
            .and_then(|line| line.splitn(2, ':').nth(1))
            .map(|rest| {
                let mut ids = Vec::new();
                let mut digits = String::new();
                for c in rest.chars().chain(std::iter::once(' ')) {
                    if c.is_ascii_digit() {
                        digits.push(c);
                    } else if !digits.is_empty() {
                        if let Ok(index) = digits.parse::<usize>() {
                            if index >= 1 && index <= chunk_ids.len() {
                                let chunk_id = chunk_ids[index - 1];
                                if !ids.contains(&chunk_id) {
                                    ids.push(chunk_id);
                                }
                            }
                        }
                        digits.clear();
                    }
                }
                ids
            })
            .unwrap_or_default();

        let explanation = response
            .lines()
            .find(|line| line.contains("설명:"))
            .and_then(|line| line.splitn(2, ':').nth(1))
            .map(|rest| rest.trim().to_string())
            .unwrap_or_else(|| response.trim().to_string());

        // A sufficient verdict clears the expansion list.
        let chunks_to_expand = if is_sufficient { Vec::new() } else { chunks_to_expand };

        LlmSufficiency { is_sufficient, missing_info, chunks_to_expand, explanation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use policy_agent_core::{ChunkType, DocumentInfo, ResultMetadata};
    use policy_agent_llm::{Completion, LlmError, TokenUsage};

    struct InsufficientLlm;

    #[async_trait]
    impl LlmClient for InsufficientLlm {
        async fn complete_answer(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Err(LlmError::Api("not used".to_string()))
        }
        async fn complete_validation(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Ok(Completion {
                text: "1. 충분성: 불충분함\n3. 확장 필요 청크: 1".to_string(),
                usage: TokenUsage::default(),
                model: "stub".to_string(),
            })
        }
    }

    struct BrokenLlm;

    #[async_trait]
    impl LlmClient for BrokenLlm {
        async fn complete_answer(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Err(LlmError::Network("down".to_string()))
        }
        async fn complete_validation(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Err(LlmError::Network("down".to_string()))
        }
    }

    fn result(chunk_id: i64, content: &str) -> SearchResult {
        SearchResult {
            chunk_id,
            document_id: 1,
            content: content.to_string(),
            similarity: 0.9,
            chunk_type: ChunkType::Text,
            page_number: None,
            section_title: None,
            clause_number: None,
            metadata: ResultMetadata::default(),
            document: DocumentInfo::default(),
            token_count: None,
        }
    }

    #[tokio::test]
    async fn empty_results_are_sufficient_without_llm() {
        let judge = ContextJudge::new(Arc::new(BrokenLlm));
        let mut state = RequestState::new("질문");
        judge.judge(&mut state).await;
        assert_eq!(state.context_sufficient, Some(true));
        assert!(state.chunks_to_expand.is_empty());
    }

    #[tokio::test]
    async fn max_expansion_count_forces_sufficient() {
        let judge = ContextJudge::new(Arc::new(InsufficientLlm));
        let mut state = RequestState::new("질문");
        state.search_results.push(result(1, "잘린 내용이 계속되"));
        state.expansion_count = expansion_constants::MAX_EXPANSION_COUNT;

        judge.judge(&mut state).await;
        assert_eq!(state.context_sufficient, Some(true));
        assert!(state.chunks_to_expand.is_empty());
    }

    #[tokio::test]
    async fn token_ceiling_forces_sufficient_on_later_passes() {
        let judge = ContextJudge::new(Arc::new(InsufficientLlm));
        let mut state = RequestState::new("질문");
        let mut big = result(1, "본문");
        big.token_count = Some(20_000);
        state.search_results.push(big);
        state.expansion_count = 1;

        judge.judge(&mut state).await;
        assert_eq!(state.context_sufficient, Some(true));
    }

    #[tokio::test]
    async fn later_passes_expand_at_most_one_chunk_forward() {
        let judge = ContextJudge::new(Arc::new(InsufficientLlm));
        let mut state = RequestState::new("질문");
        state.search_results.push(result(1, "잘린 내용이 계속되"));
        state.search_results.push(result(2, "다른 잘린 내용이 계속되"));
        state.expansion_count = 1;

        judge.judge(&mut state).await;
        assert_eq!(state.context_sufficient, Some(false));
        assert_eq!(state.chunks_to_expand.len(), 1);
        assert_eq!(state.chunks_to_expand[0].direction, ExpandDirection::Next);
    }

    #[tokio::test]
    async fn broken_llm_defaults_to_sufficient_on_complete_chunks() {
        let judge = ContextJudge::new(Arc::new(BrokenLlm));
        let mut state = RequestState::new("질문");
        state.search_results.push(result(1, "제5조 보험금은 청구일부터 삼일 이내에 지급한다."));

        judge.judge(&mut state).await;
        assert_eq!(state.context_sufficient, Some(true));
    }

    #[test]
    fn relevance_gate_blocks_unrelated_chunks() {
        let judge = ContextJudge::new(Arc::new(BrokenLlm));
        let terms = vec!["면책기간".to_string(), "보험금".to_string()];
        assert!(judge.is_relevant(&terms, "면책기간 중에는 보험금을 지급하지 않는다"));
        assert!(!judge.is_relevant(&terms, "전혀 무관한 문서 내용"));
        assert!(judge.is_relevant(&[], "아무 내용"));
    }

    #[test]
    fn parse_insufficient_with_chunk_indices() {
        let response = "1. 충분성: 불충분함\n2. 누락 정보: 지급 기한 설명이 잘림\n3. 확장 필요 청크: 1, 2\n4. 설명: 청크가 중간에서 끊김";
        let parsed = ContextJudge::parse_sufficiency(response, &[101, 202, 303]);
        assert!(!parsed.is_sufficient);
        assert_eq!(parsed.chunks_to_expand, vec![101, 202]);
        assert!(parsed.missing_info.contains("지급 기한"));
        assert!(parsed.explanation.contains("끊김"));
    }

    #[test]
    fn parse_sufficient_clears_expansion_list() {
        let response = "1. 충분성: 충분함\n2. 누락 정보: 없음\n3. 확장 필요 청크: 1\n4. 설명: 질문에 바로 답변 가능";
        let parsed = ContextJudge::parse_sufficiency(response, &[7]);
        assert!(parsed.is_sufficient);
        assert!(parsed.chunks_to_expand.is_empty());
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let response = "1. 충분성: 불충분함\n3. 확장 필요 청크: 5, 1";
        let parsed = ContextJudge::parse_sufficiency(response, &[11, 22]);
        assert_eq!(parsed.chunks_to_expand, vec![11]);
    }

    #[test]
    fn malformed_response_defaults_to_verdict_only() {
        let parsed = ContextJudge::parse_sufficiency("잘 모르겠습니다", &[1]);
        assert!(!parsed.is_sufficient || parsed.chunks_to_expand.is_empty());
    }
}
