//! Service wiring
//!
//! Builds the full graph from settings: connection pool, cache facade,
//! embedder, searchers, judge, expander, and answerer, sharing the
//! embedding and LLM clients as singletons. Components accept injected
//! trait objects, so tests assemble the same graph from in-memory pieces.

use std::sync::Arc;

use policy_agent_config::{Settings, TermsConfig};
use policy_agent_core::Error;
use policy_agent_llm::{LlmClient, OpenAiClient, OpenAiClientConfig};
use policy_agent_rag::{
    CacheFacade, ChunkExpander, Embedder, HybridSearch, KeywordSearch, OpenAiEmbedder,
    OpenAiEmbedderConfig, QueryPreprocessor, VectorSearch,
};
use policy_agent_store::{
    connect_pool, ChunkStore, PgChunkStore, PgSearchLogSink, SearchLogSink,
};
use policy_agent_text::KeywordExtractor;

use crate::answer::Answerer;
use crate::graph::Graph;
use crate::judge::ContextJudge;
use crate::search_agent::SearchAgent;
use crate::validator::AnswerValidator;

/// Assembles the graph and owns the shared clients.
pub struct ServiceContainer {
    store: Arc<dyn ChunkStore>,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
    log_sink: Arc<dyn SearchLogSink>,
    terms: TermsConfig,
}

impl ServiceContainer {
    /// Production wiring: PostgreSQL store, redis-or-memory cache,
    /// OpenAI-compatible embedding and chat clients.
    pub async fn connect(settings: &Settings) -> Result<Self, Error> {
        let pool = connect_pool(&settings.database).await?;
        let store: Arc<dyn ChunkStore> = Arc::new(PgChunkStore::new(pool.clone()));
        let log_sink: Arc<dyn SearchLogSink> = Arc::new(PgSearchLogSink::new(pool));

        let cache = Arc::new(CacheFacade::connect(&settings.cache).await);
        tracing::info!(backend = ?cache.backend_kind(), "cache facade ready");

        let embedder: Arc<dyn Embedder> = Arc::new(
            OpenAiEmbedder::new(OpenAiEmbedderConfig::from(&settings.embedding), cache)
                .map_err(Error::from)?,
        );

        let mut llm_config = OpenAiClientConfig::from(&settings.llm);
        llm_config.answer_temperature = settings.answer.temperature;
        llm_config.answer_max_tokens = settings.answer.max_tokens;
        let llm: Arc<dyn LlmClient> =
            Arc::new(OpenAiClient::new(llm_config).map_err(Error::from)?);

        let terms = TermsConfig::load_or_default(&settings.terms_path);

        Ok(Self { store, llm, embedder, log_sink, terms })
    }

    /// Wiring from pre-built collaborators (tests, embedders of the
    /// library that bring their own store or model clients).
    pub fn with_collaborators(
        store: Arc<dyn ChunkStore>,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn Embedder>,
        log_sink: Arc<dyn SearchLogSink>,
        terms: TermsConfig,
    ) -> Self {
        Self { store, llm, embedder, log_sink, terms }
    }

    /// Build the request graph.
    pub fn build_graph(&self) -> Graph {
        let extractor = Arc::new(KeywordExtractor::new());

        let vector = VectorSearch::new(
            self.store.clone(),
            self.embedder.clone(),
            self.log_sink.clone(),
        );
        let keyword = KeywordSearch::new(self.store.clone(), extractor.clone());
        let hybrid = Arc::new(HybridSearch::new(vector, keyword, self.log_sink.clone()));

        let preprocessor = Arc::new(QueryPreprocessor::new(self.terms.clone(), extractor));
        let search = SearchAgent::new(preprocessor, hybrid);

        let judge = ContextJudge::new(self.llm.clone());
        let expander = Arc::new(ChunkExpander::new(self.store.clone()));
        let validator = Arc::new(AnswerValidator::new(self.llm.clone(), self.store.clone()));
        let answerer = Answerer::new(self.llm.clone(), validator);

        Graph::new(search, judge, expander, answerer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use policy_agent_llm::{Completion, LlmError, TokenUsage};
    use policy_agent_store::{MemoryChunkStore, NullSearchLogSink};

    struct StubLlm;

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete_answer(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Ok(Completion { text: String::new(), usage: TokenUsage::default(), model: "stub".into() })
        }
        async fn complete_validation(&self, _s: &str, _u: &str) -> Result<Completion, LlmError> {
            Ok(Completion { text: String::new(), usage: TokenUsage::default(), model: "stub".into() })
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Vec<f32> {
            vec![0.0]
        }
        async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
            texts.iter().map(|_| vec![0.0]).collect()
        }
        fn model_name(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn graph_builds_from_injected_collaborators() {
        let container = ServiceContainer::with_collaborators(
            Arc::new(MemoryChunkStore::new()),
            Arc::new(StubLlm),
            Arc::new(StubEmbedder),
            Arc::new(NullSearchLogSink),
            TermsConfig::default(),
        );
        let graph = container.build_graph();
        let state = graph.run("얼마").await;
        assert_eq!(state.task_results["search"]["incomplete_query"], true);
    }
}
