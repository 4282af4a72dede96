//! Graph traversal
//!
//! The node id is a small enum with a typed transition function; the
//! judge↔expand cycle is a controlled loop bounded by `expansion_count` on
//! the state, not a data-structural cycle. Upload and manage tasks end the
//! traversal immediately; only search exercises the pipeline.

use std::sync::Arc;

use serde_json::json;

use policy_agent_config::constants::expansion as expansion_constants;
use policy_agent_core::{RequestState, TaskType};
use policy_agent_rag::ChunkExpander;

use crate::answer::Answerer;
use crate::judge::ContextJudge;
use crate::router::Router;
use crate::search_agent::SearchAgent;

/// Graph node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Router,
    Search,
    Judge,
    Expand,
    Answer,
    End,
}

/// The request graph.
pub struct Graph {
    router: Router,
    search: SearchAgent,
    judge: ContextJudge,
    expander: Arc<ChunkExpander>,
    answerer: Answerer,
}

impl Graph {
    pub fn new(
        search: SearchAgent,
        judge: ContextJudge,
        expander: Arc<ChunkExpander>,
        answerer: Answerer,
    ) -> Self {
        Self { router: Router::new(), search, judge, expander, answerer }
    }

    /// Run one query through the graph and return the final state.
    pub async fn run(&self, query: impl Into<String>) -> RequestState {
        let state = RequestState::new(query);
        self.run_state(state).await
    }

    /// Run a prepared state (e.g. with an explicit task type).
    pub async fn run_state(&self, mut state: RequestState) -> RequestState {
        let mut node = Node::Router;
        // Hard backstop against a broken transition function; the judge's
        // own bounds keep real traversals far below this.
        let mut remaining_steps = 4 + 3 * (expansion_constants::MAX_EXPANSION_COUNT as usize + 1);

        while node != Node::End {
            if remaining_steps == 0 {
                tracing::error!("traversal step limit hit, aborting");
                state.error = Some("그래프 순회 한도 초과".to_string());
                state.final_answer = "시스템 오류가 발생했습니다: 그래프 순회 한도 초과".to_string();
                state.record_task_result(
                    "system",
                    json!({ "success": false, "error": "traversal step limit" }),
                );
                break;
            }
            remaining_steps -= 1;

            tracing::debug!(?node, expansion_count = state.expansion_count, "visiting node");
            node = self.step(node, &mut state).await;
        }

        state
    }

    /// Execute one node and return the next.
    async fn step(&self, node: Node, state: &mut RequestState) -> Node {
        match node {
            Node::Router => {
                self.router.route(state);
                match state.task_type {
                    Some(TaskType::Search) | None => Node::Search,
                    // Upload and manage are handled outside the core.
                    Some(other) => {
                        tracing::info!(?other, "non-search task, pipeline skipped");
                        state.record_task_result(
                            "router",
                            json!({ "task_type": format!("{:?}", other).to_lowercase(), "handled": false }),
                        );
                        Node::End
                    }
                }
            }
            Node::Search => {
                self.search.run(state).await;
                Node::Judge
            }
            Node::Judge => {
                self.judge.judge(state).await;
                if state.context_sufficient.unwrap_or(true) {
                    Node::Answer
                } else {
                    Node::Expand
                }
            }
            Node::Expand => {
                let requests = std::mem::take(&mut state.chunks_to_expand);
                if requests.is_empty() {
                    tracing::warn!("no expansion candidates, rerouting to judge");
                    state.expansion_count += 1;
                    state.record_task_result(
                        "chunk_expansion",
                        json!({ "success": true, "expanded": false, "reason": "no candidates" }),
                    );
                    return Node::Judge;
                }

                let results = std::mem::take(&mut state.search_results);
                let expanded = self
                    .expander
                    .expand_search_results(results, &requests, None)
                    .await;

                let expanded_ids: Vec<i64> = expanded
                    .iter()
                    .filter(|r| r.metadata.expanded)
                    .map(|r| r.chunk_id)
                    .collect();

                state.search_results = expanded;
                state.expansion_count += 1;
                state.record_task_result(
                    "chunk_expansion",
                    json!({
                        "success": true,
                        "expanded": true,
                        "expanded_chunk_ids": expanded_ids,
                        "expansion_count": state.expansion_count,
                    }),
                );
                Node::Judge
            }
            Node::Answer => {
                self.answerer.run(state).await;
                Node::End
            }
            Node::End => Node::End,
        }
    }
}
