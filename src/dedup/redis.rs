//! Redis-backed idempotency store.
//!
//! Shares processed event ids between several receiver instances. Each id
//! is written as `SET <prefix><event_id> 1 PX <ttl_ms>` so Redis handles the
//! expiry; there is no sweeper to close.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopify_webhooks::dedup::RedisStore;
//!
//! let store = RedisStore::from_url("redis://127.0.0.1/", Duration::from_secs(86_400))?;
//! receiver.with_idempotency_store(Arc::new(store));
//! ```

use super::{IdempotencyStore, StoreError};
use async_trait::async_trait;
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use std::time::Duration;
use tracing::error;

/// Default key prefix for stored event ids
pub const DEFAULT_KEY_PREFIX: &str = "shopify:webhooks:event:";

/// [`IdempotencyStore`] backed by a Redis connection pool.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    ttl: Duration,
    prefix: String,
}

impl RedisStore {
    pub fn new(pool: Pool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Build a pool from a `redis://` URL.
    pub fn from_url(url: impl Into<String>, ttl: Duration) -> Result<Self, StoreError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self::new(pool, ttl))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, event_id: &str) -> String {
        format!("{}{}", self.prefix, event_id)
    }

    async fn connection(&self) -> Result<Connection, StoreError> {
        self.pool.get().await.map_err(|e| {
            error!(error = %e, "Failed to get Redis connection for idempotency store");
            StoreError::Connection(e.to_string())
        })
    }
}

#[async_trait]
impl IdempotencyStore for RedisStore {
    async fn exists(&self, event_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;

        let count: u64 = cmd("EXISTS")
            .arg(self.key(event_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(count > 0)
    }

    async fn store(&self, event_id: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        // PX rejects 0, so round sub-millisecond TTLs up.
        let ttl_ms = self.ttl.as_millis().max(1) as u64;

        let _: String = cmd("SET")
            .arg(self.key(event_id))
            .arg(1)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_key_uses_prefix() {
        let store = RedisStore::from_url("redis://127.0.0.1/", Duration::from_secs(60))
            .unwrap()
            .with_prefix("test:");
        assert_eq!(store.key("evt-1"), "test:evt-1");
    }

    #[test]
    fn test_default_prefix() {
        let store = RedisStore::from_url("redis://127.0.0.1/", Duration::from_secs(60)).unwrap();
        assert_eq!(store.key("evt-1"), "shopify:webhooks:event:evt-1");
    }
}
