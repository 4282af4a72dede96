//! Answer validation
//!
//! Four independent axes: format (structure + references), context overlap
//! (answer keywords literally present in the sources), clause existence
//! (cited 제N조 references exist in active documents), and hallucination
//! (LLM verdict that the answer is grounded). Weighted confidence with a
//! 0.7 reliability threshold; LLM or store failures score a neutral 0.5
//! with a warning instead of failing the answer.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;

use policy_agent_config::constants::answer as answer_constants;
use policy_agent_core::{SearchResult, ValidationDetail, ValidationReport};
use policy_agent_llm::{extract_json_object, LlmClient};
use policy_agent_store::ChunkStore;

static REFERENCE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[참조\s*\d+\]").unwrap_or_else(|e| panic!("{e}")));
static CLAUSE_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"제\s*(\d+)\s*조").unwrap_or_else(|e| panic!("{e}")));
static ANSWER_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[가-힣a-zA-Z0-9]{3,}").unwrap_or_else(|e| panic!("{e}")));

/// Four-axis answer validator.
pub struct AnswerValidator {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn ChunkStore>,
}

impl AnswerValidator {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn ChunkStore>) -> Self {
        Self { llm, store }
    }

    /// Run all four checks and assemble the weighted report.
    ///
    /// Format and context overlap are synchronous; clause existence (store)
    /// and hallucination (LLM) follow sequentially.
    pub async fn validate(&self, answer: &str, sources: &[SearchResult]) -> ValidationReport {
        let started = Instant::now();
        let mut warnings = Vec::new();

        let format_check = self.check_format(answer, sources, &mut warnings);
        let context_check = self.check_context_match(answer, sources);
        let clause_check = self.check_clause_existence(answer, &mut warnings).await;
        let hallucination_check = self.check_hallucination(answer, sources, &mut warnings).await;

        let confidence = hallucination_check.score * answer_constants::WEIGHT_HALLUCINATION
            + context_check.score * answer_constants::WEIGHT_CONTEXT
            + clause_check.score * answer_constants::WEIGHT_CLAUSE
            + format_check.score * answer_constants::WEIGHT_FORMAT;

        let report = ValidationReport::from_checks(
            hallucination_check,
            clause_check,
            context_check,
            format_check,
            confidence,
            started.elapsed().as_secs_f64(),
            warnings,
        );

        tracing::info!(
            confidence = report.confidence_score,
            reliable = report.is_reliable,
            "answer validation done"
        );

        report
    }

    /// Format: both section headers and at least one reference token are
    /// mandatory; clause numbers are tracked but optional.
    fn check_format(
        &self,
        answer: &str,
        sources: &[SearchResult],
        warnings: &mut Vec<String>,
    ) -> ValidationDetail {
        let has_structure = (answer.contains("**📌 답변**") || answer.contains("📌 답변"))
            && (answer.contains("**📋 관련 약관**") || answer.contains("📋 관련 약관"));
        let has_references = REFERENCE_TOKEN.is_match(answer);
        let has_clause_numbers = CLAUSE_MENTION.is_match(answer);

        if !has_structure {
            warnings.push("구조화된 형식이 없습니다".to_string());
        }
        if !has_references {
            warnings.push("참조 번호가 포함되지 않았습니다".to_string());
        }

        let sources_have_clauses = sources.iter().any(|r| {
            r.clause_number.as_deref().map(|c| !c.is_empty() && c != "N/A").unwrap_or(false)
        });
        if sources_have_clauses && !has_clause_numbers {
            warnings.push("검색 결과에 조항 번호가 있지만 답변에 포함되지 않았습니다".to_string());
        }

        let passed_count = has_structure as usize + has_references as usize;
        let score = passed_count as f64 / 2.0;

        ValidationDetail::new(
            "형식 검증",
            has_structure && has_references,
            score,
            format!(
                "구조화: {}, 참조: {}, 조항: {}",
                has_structure, has_references, has_clause_numbers
            ),
        )
    }

    /// Context overlap: fraction of answer keywords literally present in
    /// the concatenated sources.
    fn check_context_match(&self, answer: &str, sources: &[SearchResult]) -> ValidationDetail {
        let keywords = extract_answer_keywords(answer);

        if keywords.is_empty() {
            return ValidationDetail::new("컨텍스트 일치", true, 1.0, "키워드 없음 (N/A)");
        }
        if sources.is_empty() {
            return ValidationDetail::new("컨텍스트 일치", false, 0.0, "검색 결과 없음");
        }

        let all_content: String = sources
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let matched = keywords.iter().filter(|k| all_content.contains(k.as_str())).count();
        let score = matched as f64 / keywords.len() as f64;
        let passed = score >= answer_constants::CONTEXT_MATCH_THRESHOLD;

        ValidationDetail::new(
            "컨텍스트 일치",
            passed,
            score,
            format!("{}/{} 키워드 매칭 ({:.1}%)", matched, keywords.len(), score * 100.0),
        )
    }

    /// Clause existence: every 제N조 mentioned in the answer must exist in
    /// active documents. Store failure scores a neutral 0.5 with a warning.
    async fn check_clause_existence(
        &self,
        answer: &str,
        warnings: &mut Vec<String>,
    ) -> ValidationDetail {
        let mentioned = extract_clause_numbers(answer);

        if mentioned.is_empty() {
            return ValidationDetail::new("조항 존재 확인", true, 1.0, "조항 번호 없음 (N/A)");
        }

        match self.store.clause_numbers_exist(&mentioned).await {
            Ok(existing) => {
                let missing: Vec<&String> =
                    mentioned.iter().filter(|c| !existing.contains(c.as_str())).collect();
                let score = existing.len() as f64 / mentioned.len() as f64;
                let passed = score >= answer_constants::CLAUSE_EXISTENCE_THRESHOLD;

                let details = if missing.is_empty() {
                    format!("{}/{} 조항 모두 존재", existing.len(), mentioned.len())
                } else {
                    let mut missing_sorted: Vec<String> =
                        missing.iter().map(|c| c.to_string()).collect();
                    missing_sorted.sort();
                    format!(
                        "{}/{} 조항 존재, 미존재: {}",
                        existing.len(),
                        mentioned.len(),
                        missing_sorted.join(", ")
                    )
                };

                ValidationDetail::new("조항 존재 확인", passed, score, details)
            }
            Err(e) => {
                tracing::error!(error = %e, "clause existence check failed");
                warnings.push(format!("조항 존재 확인 불가: {e}"));
                ValidationDetail::new("조항 존재 확인", false, 0.5, "저장소 오류 (중립 점수)")
            }
        }
    }

    /// Hallucination: short LLM verdict that the answer is grounded in the
    /// source bundle. Parse or API failure scores a neutral 0.5.
    async fn check_hallucination(
        &self,
        answer: &str,
        sources: &[SearchResult],
        warnings: &mut Vec<String>,
    ) -> ValidationDetail {
        let context = build_validation_context(sources);

        let prompt = format!(
            "컨텍스트:\n{context}\n\n답변:\n{answer}\n\n\
             이 답변이 컨텍스트에 근거합니까? JSON 형식으로만 답변하세요:\n\
             {{\"grounded\": true/false, \"score\": 0.0-1.0, \"reason\": \"이유\"}}"
        );

        let response = match self
            .llm
            .complete_validation(
                "당신은 답변 검증 전문가입니다. 답변이 제공된 컨텍스트에만 근거하는지 확인하세요.",
                &prompt,
            )
            .await
        {
            Ok(completion) => completion.text,
            Err(e) => {
                tracing::error!(error = %e, "hallucination check failed");
                warnings.push(format!("할루시네이션 검증 오류: {e}"));
                return ValidationDetail::new(
                    "할루시네이션 검증",
                    true,
                    0.5,
                    "검증 오류 (중립 점수)",
                );
            }
        };

        match extract_json_object(&response) {
            Some(value) => {
                let grounded = value.get("grounded").and_then(|v| v.as_bool()).unwrap_or(false);
                let score = value
                    .get("score")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.5)
                    .clamp(0.0, 1.0);
                let reason = value
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .chars()
                    .take(200)
                    .collect::<String>();
                ValidationDetail::new("할루시네이션 검증", grounded, score, reason)
            }
            None => {
                tracing::warn!("hallucination verdict JSON parse failed");
                warnings.push("할루시네이션 검증 응답 파싱 실패".to_string());
                ValidationDetail::new("할루시네이션 검증", true, 0.5, "JSON 파싱 오류 (중립 점수)")
            }
        }
    }
}

/// De-duplicated answer keywords: Hangul/Latin/digit runs of length ≥ 3.
fn extract_answer_keywords(answer: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ANSWER_KEYWORD
        .find_iter(answer)
        .map(|m| m.as_str().to_string())
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Normalized 제N조 mentions, de-duplicated in first-mention order.
fn extract_clause_numbers(answer: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    CLAUSE_MENTION
        .captures_iter(answer)
        .filter_map(|caps| caps.get(1).map(|n| format!("제{}조", n.as_str())))
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Compact source bundle for the hallucination prompt, capped in length.
fn build_validation_context(sources: &[SearchResult]) -> String {
    if sources.is_empty() {
        return "검색 결과 없음".to_string();
    }
    let joined = sources
        .iter()
        .enumerate()
        .map(|(index, r)| format!("[{}] {}", index + 1, r.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.chars().count() > answer_constants::VALIDATION_CONTEXT_CHARS {
        let truncated: String = joined
            .chars()
            .take(answer_constants::VALIDATION_CONTEXT_CHARS)
            .collect();
        format!("{}...", truncated)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use policy_agent_core::{ChunkType, DocumentInfo, ResultMetadata};
    use policy_agent_llm::{Completion, LlmError, TokenUsage};
    use policy_agent_store::MemoryChunkStore;

    struct ScriptedLlm(String);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete_answer(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Ok(Completion { text: self.0.clone(), usage: TokenUsage::default(), model: "mock".into() })
        }
        async fn complete_validation(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Ok(Completion { text: self.0.clone(), usage: TokenUsage::default(), model: "mock".into() })
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete_answer(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Err(LlmError::Network("down".to_string()))
        }
        async fn complete_validation(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Err(LlmError::Network("down".to_string()))
        }
    }

    fn source(content: &str, clause: Option<&str>) -> SearchResult {
        SearchResult {
            chunk_id: 1,
            document_id: 1,
            content: content.to_string(),
            similarity: 0.9,
            chunk_type: ChunkType::Text,
            page_number: None,
            section_title: None,
            clause_number: clause.map(String::from),
            metadata: ResultMetadata::default(),
            document: DocumentInfo::default(),
            token_count: None,
        }
    }

    fn structured_answer() -> &'static str {
        "**📌 답변**\n암진단비는 삼천만원입니다 [참조 1, 제5조].\n\n**📋 관련 약관**\n- [참조 1] 제5조: 암진단비 지급"
    }

    #[tokio::test]
    async fn format_check_requires_structure_and_references() {
        let validator = AnswerValidator::new(
            Arc::new(ScriptedLlm(r#"{"grounded": true, "score": 1.0, "reason": "ok"}"#.into())),
            Arc::new(MemoryChunkStore::new()),
        );
        let mut warnings = Vec::new();

        let detail = validator.check_format(structured_answer(), &[], &mut warnings);
        assert!(detail.passed);
        assert!((detail.score - 1.0).abs() < 1e-9);

        let detail = validator.check_format("그냥 텍스트 답변", &[], &mut warnings);
        assert!(!detail.passed);
        assert_eq!(detail.score, 0.0);
    }

    #[tokio::test]
    async fn missing_clause_in_answer_warns_when_sources_have_one() {
        let validator = AnswerValidator::new(
            Arc::new(ScriptedLlm("{}".into())),
            Arc::new(MemoryChunkStore::new()),
        );
        let mut warnings = Vec::new();
        let answer = "**📌 답변**\n지급됩니다 [참조 1].\n**📋 관련 약관**\n- [참조 1]";
        validator.check_format(answer, &[source("내용", Some("제5조"))], &mut warnings);
        assert!(warnings.iter().any(|w| w.contains("조항 번호가 있지만")));
    }

    #[test]
    fn context_match_scores_fraction() {
        let validator = AnswerValidator::new(
            Arc::new(ScriptedLlm("{}".into())),
            Arc::new(MemoryChunkStore::new()),
        );
        let sources = [source("암진단비는 삼천만원을 지급한다", None)];
        let detail = validator.check_context_match("암진단비 삼천만원 지급", &sources);
        assert!(detail.passed, "details: {:?}", detail.details);

        let detail = validator.check_context_match("전혀 무관한 내용입니다", &sources);
        assert!(!detail.passed);
    }

    #[test]
    fn clause_extraction_normalizes_and_dedups() {
        let clauses = extract_clause_numbers("제5조와 제 15 조, 그리고 다시 제5조");
        assert_eq!(clauses, vec!["제5조".to_string(), "제15조".to_string()]);
    }

    #[tokio::test]
    async fn fabricated_clause_lowers_confidence() {
        let store = Arc::new(MemoryChunkStore::new());
        // Store knows nothing about 제99조.
        let validator = AnswerValidator::new(
            Arc::new(ScriptedLlm(r#"{"grounded": true, "score": 1.0, "reason": "ok"}"#.into())),
            store,
        );
        let mut warnings = Vec::new();
        let detail = validator
            .check_clause_existence("제99조에 따라 지급", &mut warnings)
            .await;
        assert!(!detail.passed);
        assert_eq!(detail.score, 0.0);
    }

    #[tokio::test]
    async fn llm_failure_scores_neutral_with_warning() {
        let validator = AnswerValidator::new(
            Arc::new(FailingLlm),
            Arc::new(MemoryChunkStore::new()),
        );
        let report = validator.validate(structured_answer(), &[source("암진단비", None)]).await;
        assert!((report.hallucination_check.score - 0.5).abs() < 1e-9);
        assert!(!report.warnings.is_empty());
        assert!(report.confidence_score >= 0.0 && report.confidence_score <= 1.0);
    }

    #[tokio::test]
    async fn grounded_structured_answer_is_reliable() {
        let store = Arc::new(MemoryChunkStore::new());
        let validator = AnswerValidator::new(
            Arc::new(ScriptedLlm(r#"{"grounded": true, "score": 0.95, "reason": "인용됨"}"#.into())),
            store,
        );
        let sources = [source("암진단비는 삼천만원입니다. 지급 관련 약관 답변 참조.", None)];
        let answer = "**📌 답변**\n암진단비는 삼천만원입니다 [참조 1].\n\n**📋 관련 약관**\n- [참조 1] 암진단비";
        let report = validator.validate(answer, &sources).await;
        assert!(report.is_reliable, "confidence: {}", report.confidence_score);
    }
}
