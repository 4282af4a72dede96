//! Request state threaded through the agent graph
//!
//! One user query drives one traversal of the graph; the state is created
//! at request arrival, mutated only by the agent currently executing, and
//! dropped at end of request. `task_results` is merged additively: each
//! agent writes under its own key and never clobbers another agent's entry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::search::SearchResult;

/// Task classification for an incoming request. Only `Search` exercises
/// the core pipeline; upload and manage are handled outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Search,
    Upload,
    Manage,
}

/// Direction in which a chunk should be expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpandDirection {
    Prev,
    Next,
    Both,
}

/// A chunk the judge wants expanded, with the refined direction and the
/// structural reasons that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandRequest {
    pub chunk_id: i64,
    pub direction: ExpandDirection,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Global state of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestState {
    /// User query.
    pub query: String,
    /// Task classification; pre-set values bypass router classification.
    pub task_type: Option<TaskType>,
    /// Search results; rewritten in place by chunk expansion.
    pub search_results: Vec<SearchResult>,
    /// Tri-state context sufficiency decision.
    pub context_sufficient: Option<bool>,
    /// Chunks the judge requested to expand.
    pub chunks_to_expand: Vec<ExpandRequest>,
    /// Number of expansion passes executed so far. Monotone, bounded.
    pub expansion_count: u32,
    /// Per-agent summaries, merged additively.
    pub task_results: HashMap<String, serde_json::Value>,
    /// Final answer text once the answerer has run.
    pub final_answer: String,
    /// Error raised by an earlier stage, if any.
    pub error: Option<String>,
}

impl RequestState {
    /// Fresh state for an incoming query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            task_type: None,
            search_results: Vec::new(),
            context_sufficient: None,
            chunks_to_expand: Vec::new(),
            expansion_count: 0,
            task_results: HashMap::new(),
            final_answer: String::new(),
            error: None,
        }
    }

    /// Fresh state with an explicit task type (bypasses classification).
    pub fn with_task_type(query: impl Into<String>, task_type: TaskType) -> Self {
        let mut state = Self::new(query);
        state.task_type = Some(task_type);
        state
    }

    /// Record an agent's summary under its own key.
    ///
    /// Keys are per-agent; an existing entry for the same key is replaced,
    /// entries of other agents are untouched.
    pub fn record_task_result(&mut self, agent: &str, value: serde_json::Value) {
        self.task_results.insert(agent.to_string(), value);
    }

    /// Current token total across search results, using stored counts when
    /// present and the supplied counter otherwise.
    pub fn context_tokens(&self, count: impl Fn(&str) -> usize) -> usize {
        self.search_results
            .iter()
            .map(|r| match r.token_count {
                Some(n) if !r.metadata.expanded => n.max(0) as usize,
                _ => count(&r.content),
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_state_is_empty() {
        let state = RequestState::new("암 진단비 얼마인가요?");
        assert_eq!(state.expansion_count, 0);
        assert!(state.context_sufficient.is_none());
        assert!(state.search_results.is_empty());
        assert!(state.error.is_none());
    }

    #[test]
    fn task_results_merge_additively() {
        let mut state = RequestState::new("q");
        state.record_task_result("search", json!({"success": true}));
        state.record_task_result("context_judgement", json!({"sufficient": false}));
        assert_eq!(state.task_results.len(), 2);
        assert_eq!(state.task_results["search"]["success"], json!(true));
    }

    #[test]
    fn context_tokens_prefers_stored_counts() {
        let mut state = RequestState::new("q");
        let mut result = crate::search::SearchResult {
            chunk_id: 1,
            document_id: 1,
            content: "가나다라".to_string(),
            similarity: 0.9,
            chunk_type: crate::chunk::ChunkType::Text,
            page_number: None,
            section_title: None,
            clause_number: None,
            metadata: Default::default(),
            document: Default::default(),
            token_count: Some(42),
        };
        state.search_results.push(result.clone());
        assert_eq!(state.context_tokens(|_| 7), 42);

        // Expanded content no longer matches the stored count.
        result.metadata.expanded = true;
        state.search_results[0] = result;
        assert_eq!(state.context_tokens(|_| 7), 7);
    }
}
