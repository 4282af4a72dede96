//! Cache facade
//!
//! Prefers a network cache (redis) and falls back to an in-process LRU when
//! redis is unreachable at startup. The choice is transparent to callers;
//! keys are plain strings and values are strings or JSON.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use redis::AsyncCommands;

use policy_agent_config::CacheConfig;

use crate::RagError;

/// Which backend the facade selected at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
    Disabled,
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process LRU cache with per-entry TTL.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let live = match entries.get(key) {
            None => return None,
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => None,
        };
        if live.is_none() {
            entries.pop(key);
        }
        live
    }

    pub fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.lock().put(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    pub fn clear_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock();
        let keys: Vec<String> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            entries.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

enum Backend {
    Redis(redis::aio::ConnectionManager),
    Memory(MemoryCache),
    Disabled,
}

/// Cache facade over redis or the in-process LRU.
pub struct CacheFacade {
    backend: Backend,
    default_ttl: Duration,
}

impl CacheFacade {
    /// Probe redis and fall back to memory. Never fails: with caching
    /// disabled every read misses and every write is a no-op.
    pub async fn connect(config: &CacheConfig) -> Self {
        let default_ttl = Duration::from_secs(config.ttl_secs);

        if !config.enabled {
            return Self { backend: Backend::Disabled, default_ttl };
        }

        match Self::try_redis(&config.redis_url).await {
            Ok(manager) => {
                tracing::info!(url = %config.redis_url, "redis cache connected");
                Self { backend: Backend::Redis(manager), default_ttl }
            }
            Err(e) => {
                tracing::warn!(error = %e, "redis unavailable, using in-process LRU cache");
                Self {
                    backend: Backend::Memory(MemoryCache::new(config.memory_max_entries)),
                    default_ttl,
                }
            }
        }
    }

    /// In-process cache without a network probe (tests, offline runs).
    pub fn memory(max_entries: usize, ttl: Duration) -> Self {
        Self {
            backend: Backend::Memory(MemoryCache::new(max_entries)),
            default_ttl: ttl,
        }
    }

    async fn try_redis(url: &str) -> Result<redis::aio::ConnectionManager, RagError> {
        let client = redis::Client::open(url).map_err(|e| RagError::Cache(e.to_string()))?;
        let connect = redis::aio::ConnectionManager::new(client);
        let mut manager = tokio::time::timeout(Duration::from_secs(2), connect)
            .await
            .map_err(|_| RagError::Cache("redis connect timeout".to_string()))?
            .map_err(|e| RagError::Cache(e.to_string()))?;

        let _pong: String = redis::cmd("PING")
            .query_async(&mut manager)
            .await
            .map_err(|e| RagError::Cache(e.to_string()))?;
        Ok(manager)
    }

    pub fn backend_kind(&self) -> CacheBackendKind {
        match &self.backend {
            Backend::Redis(_) => CacheBackendKind::Redis,
            Backend::Memory(_) => CacheBackendKind::Memory,
            Backend::Disabled => CacheBackendKind::Disabled,
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                match conn.get::<_, Option<String>>(key).await {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(error = %e, key, "cache get failed");
                        None
                    }
                }
            }
            Backend::Memory(cache) => cache.get(key),
            Backend::Disabled => None,
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                if let Err(e) = conn
                    .set_ex::<_, _, ()>(key, value, ttl.as_secs())
                    .await
                {
                    tracing::warn!(error = %e, key, "cache set failed");
                }
            }
            Backend::Memory(cache) => cache.set(key, value, ttl),
            Backend::Disabled => {}
        }
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, key, "cached JSON parse failed");
                None
            }
        }
    }

    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl).await,
            Err(e) => tracing::warn!(error = %e, key, "cache JSON encode failed"),
        }
    }

    pub async fn delete(&self, key: &str) {
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                if let Err(e) = conn.del::<_, ()>(key).await {
                    tracing::warn!(error = %e, key, "cache delete failed");
                }
            }
            Backend::Memory(cache) => cache.delete(key),
            Backend::Disabled => {}
        }
    }

    /// Delete every key starting with `prefix`.
    pub async fn clear_pattern(&self, prefix: &str) {
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let pattern = format!("{}*", prefix);
                let mut cursor: u64 = 0;
                loop {
                    let scanned: Result<(u64, Vec<String>), redis::RedisError> =
                        redis::cmd("SCAN")
                            .cursor_arg(cursor)
                            .arg("MATCH")
                            .arg(&pattern)
                            .arg("COUNT")
                            .arg(100)
                            .query_async(&mut conn)
                            .await;
                    let (next, keys) = match scanned {
                        Ok(page) => page,
                        Err(e) => {
                            tracing::warn!(error = %e, "cache scan failed");
                            break;
                        }
                    };
                    if !keys.is_empty() {
                        if let Err(e) = conn.del::<_, ()>(keys).await {
                            tracing::warn!(error = %e, "cache pattern delete failed");
                        }
                    }
                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
            }
            Backend::Memory(cache) => cache.clear_prefix(prefix),
            Backend::Disabled => {}
        }
    }
}
