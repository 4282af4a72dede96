//! Chat completion client
//!
//! One backend serves both logical calls: `complete_answer` for grounded
//! answer generation and `complete_validation` for short deterministic
//! verdicts (sufficiency and hallucination checks). Transient failures are
//! retried with exponential backoff; 4xx responses are not.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use policy_agent_config::LlmConfig;

use crate::LlmError;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Token accounting from the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// The two logical completion calls used by the pipeline.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Grounded answer generation: temperature 0.1, ~1000 tokens.
    async fn complete_answer(&self, system: &str, user: &str) -> Result<Completion, LlmError>;

    /// Validation-style completion: temperature 0, ~200 tokens. Used by the
    /// sufficiency check and the hallucination check with different prompts.
    async fn complete_validation(&self, system: &str, user: &str) -> Result<Completion, LlmError>;
}

/// Tuning for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub answer_model: String,
    pub validation_model: String,
    pub answer_temperature: f32,
    pub answer_max_tokens: usize,
    pub validation_max_tokens: usize,
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures.
    pub max_retries: u32,
    /// Initial backoff duration; doubles each retry, capped.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            answer_model: "gpt-4o".to_string(),
            validation_model: "gpt-4o-mini".to_string(),
            answer_temperature: 0.1,
            answer_max_tokens: 1000,
            validation_max_tokens: 200,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl From<&LlmConfig> for OpenAiClientConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            answer_model: config.answer_model.clone(),
            validation_model: config.validation_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            ..Default::default()
        }
    }
}

/// OpenAI-compatible chat completion backend.
pub struct OpenAiClient {
    client: Client,
    config: OpenAiClientConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: TokenUsage,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn complete(
        &self,
        model: &str,
        temperature: f32,
        max_tokens: usize,
        system: &str,
        user: &str,
    ) -> Result<Completion, LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let request = ChatRequest { model, messages: &messages, temperature, max_tokens };

        let mut backoff = self.config.initial_backoff;
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    max = self.config.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "LLM request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.config.max_backoff);
            }

            match self.execute(&request).await {
                Ok(response) => {
                    let text = response
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| LlmError::InvalidResponse("no choices".to_string()))?;
                    return Ok(Completion {
                        text,
                        usage: response.usage,
                        model: if response.model.is_empty() {
                            model.to_string()
                        } else {
                            response.model
                        },
                    });
                }
                Err(e) if is_retryable(&e) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("max retries exceeded".to_string())))
    }

    async fn execute(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 5xx is retryable, 4xx is a caller problem.
            if status.is_server_error() {
                return Err(LlmError::Network(format!("server error {}: {}", status, body)));
            }
            return Err(LlmError::Api(format!("{}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

fn is_retryable(error: &LlmError) -> bool {
    matches!(error, LlmError::Network(_) | LlmError::Timeout)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete_answer(&self, system: &str, user: &str) -> Result<Completion, LlmError> {
        self.complete(
            &self.config.answer_model,
            self.config.answer_temperature,
            self.config.answer_max_tokens,
            system,
            user,
        )
        .await
    }

    async fn complete_validation(&self, system: &str, user: &str) -> Result<Completion, LlmError> {
        self.complete(
            &self.config.validation_model,
            0.0,
            self.config.validation_max_tokens,
            system,
            user,
        )
        .await
    }
}
