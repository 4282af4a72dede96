//! Answer generation
//!
//! Builds the reference context once, generates a grounded, cited answer
//! with a strict system prompt, validates it on four axes, and regenerates
//! on low confidence up to a bounded number of attempts. Incomplete-query
//! and error states short-circuit to canned responses without an LLM call.

use std::sync::Arc;

use serde_json::json;

use policy_agent_config::constants::answer as answer_constants;
use policy_agent_core::{RequestState, SearchResult};
use policy_agent_llm::LlmClient;

use crate::validator::AnswerValidator;

const SYSTEM_PROMPT: &str = "당신은 보험약관 전문 AI 어시스턴트입니다.

## 핵심 원칙 (반드시 준수)

### 1. 정확성 보장
- 제공된 참조 문서의 내용**만**을 사용하여 답변하세요
- 일반 상식이나 사전 학습 지식을 사용하지 마세요
- 참조 문서에 명시된 표현을 그대로 인용하세요

### 2. 출처 및 조항 번호 인용
- 모든 주요 내용에 대해 **반드시** 참조 번호를 명시하세요 (예: [참조 1])
- 조항 번호가 있다면 **반드시** 포함하세요 (예: 제3조 제2항)
- 여러 참조를 조합할 경우 각각의 출처를 명시하세요

### 3. 한계 인정
- 참조 문서에 없는 내용은 \"제공된 약관 문서에서는 해당 정보를 찾을 수 없습니다\"라고 명확히 말하세요
- 불확실한 경우 \"명확하지 않습니다\"라고 답하세요
- **절대로** 추측하거나 일반적인 보험 상식으로 답변하지 마세요

### 4. 답변 구조 (필수)
**반드시 아래 형식을 따르고, 섹션 제목은 별표 2개로 감싸세요:**

**📌 답변**
(질문에 대한 핵심 답변. 조항 번호와 참조 번호 포함)

**📋 관련 약관**
- [참조 X] 조항명 및 번호: 주요 내용

**⚠️ 주의사항**
(제한사항, 예외사항 등. 없으면 생략)

## 중요
참조 문서에 정보가 없거나 불확실하면, \"죄송하지만 제공된 약관 문서에서는 해당 내용에 대한 명확한 정보를 찾을 수 없습니다. 보험사에 직접 문의하시는 것을 권장드립니다.\"라고 답변하세요.
";

/// Builds prompts and issues the generation call.
pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Assemble the reference blocks, one per search result. Expanded
    /// results list every merged chunk id.
    pub fn build_context(results: &[SearchResult]) -> String {
        if results.is_empty() {
            return "검색 결과가 없습니다.".to_string();
        }

        results
            .iter()
            .enumerate()
            .map(|(index, result)| {
                let document = &result.document;
                let filename = document.filename.as_deref().unwrap_or("알 수 없음");
                let page = result
                    .page_number
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                let clause = result.clause_number.as_deref().unwrap_or("N/A");

                let chunk_info = if result.metadata.expanded
                    && !result.metadata.included_chunks.is_empty()
                {
                    let ids: Vec<String> = result
                        .metadata
                        .included_chunks
                        .iter()
                        .map(|id| id.to_string())
                        .collect();
                    format!("청크: {}", ids.join(", "))
                } else {
                    format!("청크: {}", result.chunk_id)
                };

                format!(
                    "[참조 {}] (유사도: {:.3})\n문서: {}, 페이지: {}, 조항: {}\n{}\n내용:\n{}\n",
                    index + 1,
                    result.similarity,
                    filename,
                    page,
                    clause,
                    chunk_info,
                    result.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One generation call over the prepared context.
    pub async fn generate(
        &self,
        query: &str,
        context: &str,
    ) -> Result<(String, u32), policy_agent_llm::LlmError> {
        let user = format!("참조 문서:\n\n{}\n\n질문: {}", context, query);
        let completion = self.llm.complete_answer(SYSTEM_PROMPT, &user).await?;
        Ok((completion.text, completion.usage.total_tokens))
    }
}

/// Generate → validate → maybe regenerate, bounded attempts.
pub struct Answerer {
    generator: AnswerGenerator,
    validator: Arc<AnswerValidator>,
}

impl Answerer {
    pub fn new(llm: Arc<dyn LlmClient>, validator: Arc<AnswerValidator>) -> Self {
        Self { generator: AnswerGenerator::new(llm), validator }
    }

    pub async fn run(&self, state: &mut RequestState) {
        // Search-stage error: canned apology, no LLM call.
        if let Some(error) = state.error.clone() {
            tracing::warn!(%error, "answering skipped due to search error");
            state.final_answer = format!("죄송합니다. {}", error);
            state.record_task_result("answer", json!({ "success": false, "error": error }));
            return;
        }

        // Incomplete query: suggestion response, no LLM call.
        if let Some(suggestions) = self.incomplete_suggestions(state) {
            let mut answer =
                "질문이 조금 더 구체적이면 정확한 약관 내용을 찾아드릴 수 있습니다.".to_string();
            for suggestion in &suggestions {
                answer.push_str("\n- ");
                answer.push_str(suggestion);
            }
            state.final_answer = answer;
            state.record_task_result(
                "answer",
                json!({ "success": true, "incomplete_query": true, "suggestions": suggestions }),
            );
            return;
        }

        // Nothing retrieved: canned no-information response.
        if state.search_results.is_empty() {
            state.final_answer = "죄송합니다. 질문하신 내용과 관련된 약관 정보를 찾을 수 없습니다.\n다른 표현으로 다시 질문하시거나, 더 구체적인 키워드를 사용해주세요.".to_string();
            state.record_task_result("answer", json!({ "success": true, "no_results": true }));
            return;
        }

        // The context is assembled once and reused across regenerations.
        let context = AnswerGenerator::build_context(&state.search_results);

        for attempt in 0..answer_constants::MAX_ATTEMPTS {
            tracing::info!(attempt = attempt + 1, max = answer_constants::MAX_ATTEMPTS, "generating answer");

            let (answer, tokens_used) =
                match self.generator.generate(&state.query, &context).await {
                    Ok(generated) => generated,
                    Err(e) => {
                        tracing::error!(error = %e, attempt = attempt + 1, "generation failed");
                        if attempt + 1 == answer_constants::MAX_ATTEMPTS {
                            state.final_answer = format!(
                                "죄송합니다. 답변 생성 중 오류가 발생했습니다: {}",
                                e
                            );
                            state.record_task_result(
                                "answer",
                                json!({
                                    "success": false,
                                    "error": e.to_string(),
                                    "attempts": attempt + 1,
                                }),
                            );
                            return;
                        }
                        continue;
                    }
                };

            let mut validation = self.validator.validate(&answer, &state.search_results).await;
            validation.regeneration_count = attempt;

            tracing::info!(
                confidence = validation.confidence_score,
                reliable = validation.is_reliable,
                attempt = attempt + 1,
                "validation done"
            );

            if validation.is_reliable || attempt + 1 == answer_constants::MAX_ATTEMPTS {
                if !validation.is_reliable {
                    tracing::warn!(
                        confidence = validation.confidence_score,
                        "returning low-confidence answer after final attempt"
                    );
                }
                let validation_json =
                    serde_json::to_value(&validation).unwrap_or_else(|_| json!({}));
                state.final_answer = answer;
                state.record_task_result(
                    "answer",
                    json!({
                        "success": true,
                        "tokens_used": tokens_used,
                        "validation": validation_json,
                    }),
                );
                return;
            }

            tracing::warn!(
                confidence = validation.confidence_score,
                "low confidence, regenerating"
            );
        }

        // Unreachable: the loop always returns on the last attempt.
        state.final_answer = "죄송합니다. 답변 생성 중 문제가 발생했습니다.".to_string();
        state.record_task_result("answer", json!({ "success": false, "error": "unexpected" }));
    }

    fn incomplete_suggestions(&self, state: &RequestState) -> Option<Vec<String>> {
        let search = state.task_results.get("search")?;
        if !search.get("incomplete_query").and_then(|v| v.as_bool()).unwrap_or(false) {
            return None;
        }
        let suggestions = search
            .get("suggestions")
            .and_then(|v| v.as_array())
            .map(|array| {
                array
                    .iter()
                    .filter_map(|s| s.as_str().map(String::from))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Some(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_agent_core::{ChunkType, DocumentInfo, ResultMetadata};

    fn result(chunk_id: i64, content: &str) -> SearchResult {
        SearchResult {
            chunk_id,
            document_id: 1,
            content: content.to_string(),
            similarity: 0.912,
            chunk_type: ChunkType::Text,
            page_number: Some(4),
            section_title: None,
            clause_number: Some("제5조".to_string()),
            metadata: ResultMetadata::default(),
            document: DocumentInfo {
                filename: Some("암보험약관.pdf".to_string()),
                document_type: Some("policy".to_string()),
                company_name: None,
            },
            token_count: None,
        }
    }

    #[test]
    fn context_blocks_carry_annotation() {
        let context = AnswerGenerator::build_context(&[result(7, "제5조 암진단비를 지급한다.")]);
        assert!(context.contains("[참조 1]"));
        assert!(context.contains("암보험약관.pdf"));
        assert!(context.contains("페이지: 4"));
        assert!(context.contains("조항: 제5조"));
        assert!(context.contains("청크: 7"));
        assert!(context.contains("제5조 암진단비를 지급한다."));
    }

    #[test]
    fn expanded_results_list_included_chunks() {
        let mut expanded = result(7, "병합된 내용");
        expanded.metadata.expanded = true;
        expanded.metadata.included_chunks = vec![6, 7, 8];
        let context = AnswerGenerator::build_context(&[expanded]);
        assert!(context.contains("청크: 6, 7, 8"));
    }

    #[test]
    fn empty_results_have_placeholder_context() {
        assert_eq!(AnswerGenerator::build_context(&[]), "검색 결과가 없습니다.");
    }
}
