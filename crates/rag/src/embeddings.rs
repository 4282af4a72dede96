//! Embedding service
//!
//! Cache-through embedding over an OpenAI-compatible API. Keys are
//! `embedding:{model}:{md5(text)}`; batch work is bounded by a semaphore.
//! On final failure an entry degrades to a zero vector with a log line;
//! search callers never see an error from this layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use policy_agent_config::EmbeddingConfig;
use policy_agent_core::EMBEDDING_DIM;

use crate::cache::CacheFacade;
use crate::RagError;

/// Produces dense query/content embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. Returns a zero vector (and logs) on failure.
    async fn embed(&self, text: &str) -> Vec<f32>;

    /// Embed several texts, preserving order. Failing entries degrade to
    /// zero vectors.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>>;

    fn model_name(&self) -> &str;
}

/// Tuning for the OpenAI-compatible embedder.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub concurrency: usize,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub timeout: Duration,
}

impl Default for OpenAiEmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "text-embedding-3-large".to_string(),
            dimensions: EMBEDDING_DIM,
            concurrency: 5,
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&EmbeddingConfig> for OpenAiEmbedderConfig {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            concurrency: config.concurrency.max(1),
            ..Default::default()
        }
    }
}

/// OpenAI-compatible embedder with cache-through.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
    cache: Arc<CacheFacade>,
    semaphore: Semaphore,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig, cache: Arc<CacheFacade>) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Embedding(format!("HTTP client: {}", e)))?;
        let semaphore = Semaphore::new(config.concurrency.max(1));
        Ok(Self { client, config, cache, semaphore })
    }

    fn cache_key(&self, text: &str) -> String {
        let digest = md5::compute(format!("{}:{}", self.config.model, text));
        format!("embedding:{}:{:x}", self.config.model, digest)
    }

    fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.config.dimensions]
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimensions,
        };

        let mut backoff = self.config.initial_backoff;
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(attempt, "embedding request failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.config.max_backoff);
            }

            match self.execute(&request).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| RagError::Embedding("max retries exceeded".to_string())))
    }

    async fn execute(&self, request: &EmbeddingRequest<'_>) -> Result<Vec<Vec<f32>>, RagError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("{}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            tracing::warn!("empty text given to embedder, returning zero vector");
            return self.zero_vector();
        }

        let key = self.cache_key(text);
        if let Some(cached) = self.cache.get_json::<Vec<f32>>(&key).await {
            if cached.len() == self.config.dimensions {
                tracing::debug!("embedding cache hit");
                return cached;
            }
        }

        match self.request_embeddings(std::slice::from_ref(&text.to_string())).await {
            Ok(mut embeddings) if !embeddings.is_empty() => {
                let embedding = embeddings.swap_remove(0);
                self.cache.set_json(&key, &embedding, None).await;
                embedding
            }
            Ok(_) => {
                tracing::error!("embedding API returned no data");
                self.zero_vector()
            }
            Err(e) => {
                tracing::error!(error = %e, "embedding failed, returning zero vector");
                self.zero_vector()
            }
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        // Resolve cache hits first; only misses go to the API.
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<(usize, String)> = Vec::new();
        for (index, text) in texts.iter().enumerate() {
            let key = self.cache_key(text);
            match self.cache.get_json::<Vec<f32>>(&key).await {
                Some(cached) if cached.len() == self.config.dimensions => {
                    results.push(Some(cached));
                }
                _ => {
                    results.push(None);
                    misses.push((index, text.clone()));
                }
            }
        }

        if !misses.is_empty() {
            tracing::debug!(hits = texts.len() - misses.len(), misses = misses.len(), "embedding batch");
            let miss_texts: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            match self.request_embeddings(&miss_texts).await {
                Ok(embeddings) if embeddings.len() == misses.len() => {
                    for ((index, text), embedding) in misses.iter().zip(embeddings) {
                        let key = self.cache_key(text);
                        self.cache.set_json(&key, &embedding, None).await;
                        results[*index] = Some(embedding);
                    }
                }
                Ok(_) => tracing::error!("embedding API returned wrong batch size"),
                Err(e) => tracing::error!(error = %e, "batch embedding failed"),
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| self.zero_vector()))
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> OpenAiEmbedder {
        let cache = Arc::new(CacheFacade::memory(16, Duration::from_secs(60)));
        OpenAiEmbedder::new(
            OpenAiEmbedderConfig {
                endpoint: "http://127.0.0.1:1".to_string(),
                max_retries: 0,
                initial_backoff: Duration::from_millis(1),
                timeout: Duration::from_millis(200),
                ..Default::default()
            },
            cache,
        )
        .unwrap()
    }

    #[test]
    fn cache_keys_hash_model_and_text() {
        let embedder = embedder();
        let a = embedder.cache_key("암 진단비");
        let b = embedder.cache_key("암 진단비 얼마");
        assert_ne!(a, b);
        assert!(a.starts_with("embedding:text-embedding-3-large:"));
    }

    #[tokio::test]
    async fn unreachable_api_degrades_to_zero_vector() {
        let embedder = embedder();
        let vector = embedder.embed("보험금").await;
        assert_eq!(vector.len(), EMBEDDING_DIM);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn empty_text_is_zero_vector_without_api_call() {
        let embedder = embedder();
        let vector = embedder.embed("   ").await;
        assert!(vector.iter().all(|v| *v == 0.0));
    }
}
