//! LLM integration
//!
//! Features:
//! - `LlmClient` trait with the two logical calls the pipeline needs:
//!   answer generation (temp 0.1, ~1000 tokens) and validation-style
//!   completions (temp 0, ~200 tokens)
//! - OpenAI-compatible chat backend over reqwest with bounded retry and
//!   exponential backoff
//! - Lenient JSON extraction for models that wrap JSON in prose or fences

pub mod client;
pub mod json;

pub use client::{
    ChatMessage, Completion, LlmClient, OpenAiClient, OpenAiClientConfig, Role, TokenUsage,
};
pub use json::extract_json_object;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for policy_agent_core::Error {
    fn from(err: LlmError) -> Self {
        policy_agent_core::Error::Llm(err.to_string())
    }
}
