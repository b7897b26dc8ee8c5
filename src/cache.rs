//! # Response Cache Module
//!
//! ## Purpose
//! Client for the external key-value cache used for write-through, TTL-bound
//! response caching. Cache entries are disposable projections; losing all of
//! them costs performance, never correctness.
//!
//! ## Input/Output Specification
//! - **Input**: Query fingerprints (string keys), serialized payloads, TTLs
//! - **Output**: Cached payloads on hit, `None` on miss
//! - **Lifecycle**: entries expire independently; a wholesale flush runs at
//!   process startup (cold-cache policy)

use crate::config::CacheConfig;
use crate::errors::{Result, SearchError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Contract the query engine depends on; implemented over Redis in production
/// and by in-memory fakes in tests.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Fetch a cached payload; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a payload with a per-entry time-to-live in seconds
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    /// Clear every entry (startup cold-cache policy)
    async fn flush_all(&self) -> Result<()>;

    /// Connectivity check for the health surface
    async fn ping(&self) -> Result<()>;
}

/// Redis implementation of [`ResponseCache`]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to the cache. The connection manager reconnects on its own, so
    /// the handle is created once at startup and shared across requests.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| SearchError::Cache {
            operation: "connect".to_string(),
            details: e.to_string(),
        })?;

        let connection =
            ConnectionManager::new(client)
                .await
                .map_err(|e| SearchError::Cache {
                    operation: "connect".to_string(),
                    details: e.to_string(),
                })?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| SearchError::Cache {
            operation: format!("get {}", key),
            details: e.to_string(),
        })?;
        Ok(value)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| SearchError::Cache {
                operation: format!("setex {}", key),
                details: e.to_string(),
            })?;
        Ok(())
    }

    async fn flush_all(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("FLUSHALL")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| SearchError::Cache {
                operation: "flushall".to_string(),
                details: e.to_string(),
            })?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| SearchError::Cache {
                operation: "ping".to_string(),
                details: e.to_string(),
            })?;
        Ok(())
    }
}
