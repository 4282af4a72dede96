//! PostgreSQL connection pool

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use policy_agent_config::DatabaseConfig;

use crate::StoreError;

/// Build the shared connection pool.
///
/// Pool sizing follows the service profile: a base pool plus overflow,
/// hourly recycling, and a pre-ping on checkout so stale connections are
/// dropped instead of surfacing as query errors.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    tracing::info!(
        pool_size = config.pool_size,
        overflow = config.pool_overflow,
        "connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.pool_size.min(4))
        .max_connections(config.pool_size + config.pool_overflow)
        .max_lifetime(Duration::from_secs(config.recycle_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .test_before_acquire(true)
        .connect(&config.url)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    Ok(pool)
}
