//! Idempotency stores.
//!
//! The platform delivers at least once: the same event can arrive several
//! times with the same `X-Shopify-Event-Id`. An [`IdempotencyStore`]
//! remembers which event ids were already accepted so redeliveries are
//! acknowledged without being processed again.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: process-local map with TTL expiry and a background sweeper
//! - `RedisStore` (feature `redis`): shared store backed by `SET ... PX`

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

/// Errors reported by a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("idempotency store connection error: {0}")]
    Connection(String),

    #[error("idempotency store backend error: {0}")]
    Backend(String),
}

/// Records processed event ids.
///
/// Implementations must be safe to call from many tasks at once. `exists`
/// and `store` are not atomic together: two concurrent deliveries of the
/// same id may both see `false`.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Whether `event_id` was stored and has not expired.
    async fn exists(&self, event_id: &str) -> Result<bool, StoreError>;

    /// Remember `event_id` for the store's TTL. Storing an id again
    /// refreshes its expiry.
    async fn store(&self, event_id: &str) -> Result<(), StoreError>;
}
