//! In-memory idempotency store.
//!
//! Entries live in a map keyed by event id. A background task wakes every
//! `ttl / 2` (at most every 12 hours) and evicts expired entries; [`MemoryStore::close`] stops it.
//! Lookups also compare against the TTL, so an entry is never reported as
//! present after it expired, even if the sweeper has not run yet.

use super::{IdempotencyStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

struct Shared {
    entries: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl Shared {
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, stored_at| now.duration_since(*stored_at) < self.ttl);
        before - entries.len()
    }
}

/// Process-local [`IdempotencyStore`] with TTL expiry.
///
/// Must be created inside a Tokio runtime: the constructor spawns the
/// sweeper task.
pub struct MemoryStore {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        let shared = Arc::new(Shared {
            entries: RwLock::new(HashMap::new()),
            ttl,
        });
        let cancel = CancellationToken::new();
        let sweeper = tokio::spawn(sweep_loop(shared.clone(), cancel.clone()));

        debug!(ttl_ms = ttl.as_millis() as u64, "Memory idempotency store started");

        Self {
            shared,
            cancel,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.shared
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the sweeper and wait for it to exit.
    ///
    /// Idempotent. The store keeps answering lookups afterwards but expired
    /// entries are no longer evicted.
    pub async fn close(&self) {
        self.cancel.cancel();

        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Idempotency sweeper task failed");
            }
            debug!("Memory idempotency store closed");
        }
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn exists(&self, event_id: &str) -> Result<bool, StoreError> {
        let entries = self
            .shared
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        Ok(entries
            .get(event_id)
            .is_some_and(|stored_at| stored_at.elapsed() < self.shared.ttl))
    }

    async fn store(&self, event_id: &str) -> Result<(), StoreError> {
        self.shared
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id.to_string(), Instant::now());
        Ok(())
    }
}

fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 2).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

async fn sweep_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    let period = sweep_interval(shared.ttl);
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let evicted = shared.sweep();
                if evicted > 0 {
                    debug!(evicted, "Evicted expired event ids");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_then_exists() {
        let store = MemoryStore::new(Duration::from_secs(60));

        assert!(!store.exists("evt-1").await.unwrap());
        store.store("evt-1").await.unwrap();
        assert!(store.exists("evt-1").await.unwrap());
        assert!(!store.exists("evt-2").await.unwrap());
        assert_eq!(store.len(), 1);

        store.close().await;
    }

    #[test]
    fn test_sweep_interval_bounds() {
        assert_eq!(sweep_interval(Duration::ZERO), MIN_SWEEP_INTERVAL);
        assert_eq!(sweep_interval(Duration::from_secs(60)), Duration::from_secs(30));
        assert_eq!(sweep_interval(Duration::from_secs(86_400)), MAX_SWEEP_INTERVAL);
        assert_eq!(sweep_interval(Duration::MAX), MAX_SWEEP_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_keeps_sweeper_running() {
        let store = MemoryStore::new(Duration::from_secs(u64::MAX));
        store.store("evt-1").await.unwrap();

        tokio::time::sleep(MAX_SWEEP_INTERVAL * 2 + Duration::from_secs(1)).await;

        let finished = store
            .sweeper
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| handle.is_finished());
        assert_eq!(finished, Some(false));
        assert!(store.exists("evt-1").await.unwrap());

        store.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryStore::new(Duration::from_millis(100));
        store.store("evt-1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.exists("evt-1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!store.exists("evt-1").await.unwrap());

        store.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_expired_entries() {
        let store = MemoryStore::new(Duration::from_millis(100));
        store.store("evt-1").await.unwrap();
        store.store("evt-2").await.unwrap();
        assert_eq!(store.len(), 2);

        // Two sweep periods past expiry.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(store.is_empty());

        store.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_refreshes_expiry() {
        let store = MemoryStore::new(Duration::from_millis(100));
        store.store("evt-1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        store.store("evt-1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.exists("evt-1").await.unwrap());

        store.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = MemoryStore::new(Duration::from_millis(10));
        store.close().await;
        store.close().await;

        // Lookups still work once the sweeper is gone.
        store.store("evt-1").await.unwrap();
        assert!(store.exists("evt-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_tiny_ttl_does_not_spin() {
        let store = MemoryStore::new(Duration::ZERO);
        store.store("evt-1").await.unwrap();
        assert!(!store.exists("evt-1").await.unwrap());
        store.close().await;
    }
}
