//! Search log sink
//!
//! One structured record per search. Logging failures are swallowed with a
//! warning; a failed insert must never fail the request that produced it.

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::PgPool;

use policy_agent_core::SearchLogEntry;

/// Append-only sink for search events.
#[async_trait]
pub trait SearchLogSink: Send + Sync {
    async fn log(&self, entry: &SearchLogEntry);
}

/// Writes search logs to the `search_logs` table.
#[derive(Clone)]
pub struct PgSearchLogSink {
    pool: PgPool,
}

impl PgSearchLogSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchLogSink for PgSearchLogSink {
    async fn log(&self, entry: &SearchLogEntry) {
        let result = sqlx::query(
            "INSERT INTO search_logs \
             (user_id, query, query_intent, search_type, results_count, \
              top_similarity_score, response_time_ms, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.user_id)
        .bind(&entry.query)
        .bind(&entry.query_intent)
        .bind(entry.search_type.to_string())
        .bind(entry.results_count as i32)
        .bind(entry.top_similarity)
        .bind(entry.response_time_ms as i64)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "search log insert failed");
        }
    }
}

/// Discards all entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSearchLogSink;

#[async_trait]
impl SearchLogSink for NullSearchLogSink {
    async fn log(&self, _entry: &SearchLogEntry) {}
}

/// Captures entries in memory, for tests.
#[derive(Default)]
pub struct MemorySearchLogSink {
    entries: Mutex<Vec<SearchLogEntry>>,
}

impl MemorySearchLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<SearchLogEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl SearchLogSink for MemorySearchLogSink {
    async fn log(&self, entry: &SearchLogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use policy_agent_core::SearchType;

    #[tokio::test]
    async fn memory_sink_captures_entries() {
        let sink = MemorySearchLogSink::new();
        sink.log(&SearchLogEntry {
            user_id: None,
            query: "암 진단비".to_string(),
            query_intent: Some("search".to_string()),
            search_type: SearchType::Hybrid,
            results_count: 3,
            top_similarity: 0.91,
            response_time_ms: 42,
            created_at: Utc::now(),
        })
        .await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].search_type, SearchType::Hybrid);
    }
}
