//! Intent router
//!
//! Classifies a free-form query into search / upload / manage by keyword
//! scoring. Ties and all-zero scores default to search. An explicit
//! `task_type` already on the state bypasses classification.

use policy_agent_core::{RequestState, TaskType};

const SEARCH_KEYWORDS: [&str; 19] = [
    "검색", "찾아", "알려줘", "알려주세요", "무엇", "어떻게", "언제", "보장", "보험", "약관",
    "조항", "내용", "설명", "궁금", "질문", "문의", "확인", "가입", "해지",
];

const UPLOAD_KEYWORDS: [&str; 7] = ["업로드", "올려", "등록", "추가", "파일", "pdf", "문서"];

const MANAGE_KEYWORDS: [&str; 6] = ["관리", "목록", "삭제", "다운로드", "조회", "보기"];

/// Keyword-scoring intent router.
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query. The highest keyword score wins; search on ties.
    pub fn classify(&self, query: &str) -> TaskType {
        let query_lower = query.to_lowercase();
        let score = |keywords: &[&str]| {
            keywords.iter().filter(|k| query_lower.contains(*k)).count()
        };

        let search_score = score(&SEARCH_KEYWORDS);
        let upload_score = score(&UPLOAD_KEYWORDS);
        let manage_score = score(&MANAGE_KEYWORDS);

        let intent = if upload_score > search_score && upload_score > manage_score {
            TaskType::Upload
        } else if manage_score > search_score && manage_score > upload_score {
            TaskType::Manage
        } else {
            TaskType::Search
        };

        tracing::info!(
            query = %query.chars().take(50).collect::<String>(),
            ?intent,
            search_score,
            upload_score,
            manage_score,
            "intent classified"
        );

        intent
    }

    /// Resolve the task type for this request, honoring a pre-set value.
    pub fn route(&self, state: &mut RequestState) {
        let task_type = match state.task_type {
            Some(explicit) => {
                tracing::info!(?explicit, "explicit task type, classification skipped");
                explicit
            }
            None if state.query.is_empty() => TaskType::Search,
            None => self.classify(&state.query),
        };
        state.task_type = Some(task_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_queries_route_to_search() {
        let router = Router::new();
        assert_eq!(router.classify("암 진단비 보장 내용 알려줘"), TaskType::Search);
        assert_eq!(router.classify("면책기간이 궁금해요"), TaskType::Search);
    }

    #[test]
    fn upload_and_manage_keywords_win_when_dominant() {
        let router = Router::new();
        assert_eq!(router.classify("PDF 파일 업로드"), TaskType::Upload);
        assert_eq!(router.classify("목록 삭제"), TaskType::Manage);
    }

    #[test]
    fn zero_scores_default_to_search() {
        assert_eq!(Router::new().classify("안녕하세요"), TaskType::Search);
    }

    #[test]
    fn explicit_task_type_bypasses_classification() {
        let mut state = RequestState::with_task_type("파일 업로드", TaskType::Search);
        Router::new().route(&mut state);
        assert_eq!(state.task_type, Some(TaskType::Search));
    }

    #[test]
    fn empty_query_routes_to_search() {
        let mut state = RequestState::new("");
        Router::new().route(&mut state);
        assert_eq!(state.task_type, Some(TaskType::Search));
    }
}
