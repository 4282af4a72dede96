//! Agent graph
//!
//! One user query drives one traversal:
//!
//! ```text
//! Router ─► Search ─► Judge ─┬─► Expand ─► Judge (bounded loop)
//!                            └─► Answer ─► (validate, maybe regenerate) ─► End
//! ```
//!
//! Agents communicate only through the shared [`RequestState`]; the
//! judge↔expand cycle is bounded by `expansion_count`, and the node id is a
//! typed enum rather than a string lookup.

pub mod answer;
pub mod container;
pub mod graph;
pub mod judge;
pub mod router;
pub mod search_agent;
pub mod validator;

pub use answer::{AnswerGenerator, Answerer};
pub use container::ServiceContainer;
pub use graph::{Graph, Node};
pub use judge::{ContextJudge, LlmSufficiency};
pub use router::Router;
pub use search_agent::SearchAgent;
pub use validator::AnswerValidator;

pub use policy_agent_core::RequestState;

use thiserror::Error;

/// Graph errors
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Traversal error: {0}")]
    Traversal(String),
}

impl From<GraphError> for policy_agent_core::Error {
    fn from(err: GraphError) -> Self {
        policy_agent_core::Error::Graph(err.to_string())
    }
}
