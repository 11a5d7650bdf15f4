//! Asynchronous processing - bounded worker pool.
//!
//! The HTTP layer must answer the platform quickly, so handlers can run in
//! the background instead. An [`AsyncProcessor`] accepts events without
//! blocking; the built-in [`WorkerPool`] runs them on a fixed number of
//! Tokio tasks.
//!
//! ```text
//! submit() ──try──► [ bounded queue ] ──► worker 1 ──► router.dispatch()
//!    │                                ──► worker 2 ──►      │
//!    │ full                           ──► worker N ──►      ▼ Err
//!    ▼                                               retry with backoff
//! observer(QueueFull)                                 then observer(err)
//! ```
//!
//! Submission never waits: when the queue is full the event is dropped and
//! reported as [`DispatchError::QueueFull`]. The platform redelivers
//! unacknowledged webhooks, and a blocked request would time out anyway.
//!
//! A failed dispatch is retried in place by the same worker, sleeping
//! `retry_base_delay * 2^attempt` between attempts. The worker is occupied
//! during the sleep.
//!
//! A handler that panics fails its event on the spot, without retries. The
//! worker survives and moves on to the next event.

use crate::config::ConfigError;
use crate::event::Event;
use crate::router::{DispatchError, ErrorObserver, Router};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Base delay between retries unless configured otherwise.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Errors returned by [`AsyncProcessor::shutdown`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// Workers were still busy when the deadline passed. They keep running
    /// in the background until they finish their current event.
    #[error("worker pool did not drain within {deadline:?}")]
    DeadlineExceeded { deadline: Duration },

    #[error("worker pool already shut down")]
    AlreadyShutDown,
}

/// Background processing strategy.
///
/// Implement this to hand events to an external queue instead of the
/// in-process [`WorkerPool`].
#[async_trait]
pub trait AsyncProcessor: Send + Sync {
    /// Accept an event for background dispatch through `router`.
    ///
    /// Must not block. An event that cannot be accepted is reported to the
    /// processor's error observer and dropped.
    fn submit(&self, event: Event, router: Arc<Router>);

    /// Stop accepting events and wait for accepted ones to finish, up to
    /// `deadline`.
    async fn shutdown(&self, deadline: Duration) -> Result<(), ShutdownError>;
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker tasks (must be at least 1)
    pub workers: usize,

    /// Events that may wait for a free worker; 0 means an event is only
    /// accepted when a worker is idle
    pub queue_capacity: usize,

    /// Retries after the first failed attempt (0 disables retrying)
    pub max_retries: u32,

    /// Delay before the first retry; doubles on every further retry
    pub retry_base_delay: Duration,
}

impl PoolConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            max_retries: 0,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ValidationError(
                "worker pool needs at least one worker".to_string(),
            ));
        }
        self.slots()?;
        Ok(())
    }

    /// Events the pool holds at once, queued or running.
    fn slots(&self) -> Result<usize, ConfigError> {
        self.workers
            .checked_add(self.queue_capacity)
            .filter(|slots| *slots <= Semaphore::MAX_PERMITS)
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "workers + queue_capacity must not exceed {}",
                    Semaphore::MAX_PERMITS
                ))
            })
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(10, 1000)
    }
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`, saturating.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Events accepted into the queue
    pub submitted: u64,
    /// Events rejected because the queue was full or the pool was closed
    pub dropped: u64,
    /// Events whose dispatch eventually succeeded
    pub succeeded: u64,
    /// Events that failed on the final attempt
    pub failed: u64,
    /// Retry attempts made
    pub retried: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

struct Work {
    event: Event,
    router: Arc<Router>,
    // Released once the event is fully processed.
    _slot: OwnedSemaphorePermit,
}

struct Shared {
    max_retries: u32,
    retry_base_delay: Duration,
    observer: Option<ErrorObserver>,
    counters: Counters,
}

impl Shared {
    fn report(&self, event: &Event, error: &DispatchError) {
        if let Some(observer) = &self.observer {
            observer(event, error);
        }
    }

    async fn process(&self, worker: usize, work: Work) {
        let Work { event, router, .. } = work;
        let mut attempt = 0;

        loop {
            let outcome = AssertUnwindSafe(router.dispatch(&event))
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(result) => result,
                Err(panic) => {
                    let error = DispatchError::HandlerPanicked {
                        topic: event.topic().clone(),
                        message: panic_message(panic.as_ref()),
                    };
                    error!(
                        worker,
                        topic = %event.topic(),
                        event_id = %event.event_id(),
                        error = %error,
                        "Handler panicked"
                    );
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    self.report(&event, &error);
                    return;
                }
            };

            match result {
                Ok(()) => {
                    self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(error) if attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_base_delay, attempt);
                    warn!(
                        worker,
                        topic = %event.topic(),
                        event_id = %event.event_id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Dispatch failed, retrying"
                    );
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(
                        worker,
                        topic = %event.topic(),
                        event_id = %event.event_id(),
                        attempts = attempt + 1,
                        error = %error,
                        "Dispatch failed, giving up"
                    );
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    self.report(&event, &error);
                    return;
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Fixed-size pool of Tokio worker tasks fed by a bounded queue.
///
/// At most `workers + queue_capacity` events are in the pool at once,
/// counting both queued and running ones.
pub struct WorkerPool {
    shared: Arc<Shared>,
    slots: Arc<Semaphore>,
    sender: Mutex<Option<mpsc::Sender<Work>>>,
    tracker: TaskTracker,
    closing: AtomicBool,
}

impl WorkerPool {
    /// Start the workers. Must be called inside a Tokio runtime.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Start the workers with an observer for final failures and drops.
    pub fn with_observer<F>(config: PoolConfig, observer: F) -> Result<Self, ConfigError>
    where
        F: Fn(&Event, &DispatchError) + Send + Sync + 'static,
    {
        Self::build(config, Some(Arc::new(observer)))
    }

    fn build(config: PoolConfig, observer: Option<ErrorObserver>) -> Result<Self, ConfigError> {
        config.validate()?;

        let slots = config.slots()?;
        let (sender, receiver) = mpsc::channel(slots);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let shared = Arc::new(Shared {
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
            observer,
            counters: Counters::default(),
        });

        let tracker = TaskTracker::new();
        for worker in 0..config.workers {
            tracker.spawn(worker_loop(worker, receiver.clone(), shared.clone()));
        }

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            max_retries = config.max_retries,
            "Worker pool started"
        );

        Ok(Self {
            shared,
            slots: Arc::new(Semaphore::new(slots)),
            sender: Mutex::new(Some(sender)),
            tracker,
            closing: AtomicBool::new(false),
        })
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.shared.counters;
        PoolStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn drop_event(&self, event: &Event, error: DispatchError) {
        self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            topic = %event.topic(),
            event_id = %event.event_id(),
            error = %error,
            "Event dropped"
        );
        self.shared.report(event, &error);
    }
}

#[async_trait]
impl AsyncProcessor for WorkerPool {
    fn submit(&self, event: Event, router: Arc<Router>) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(sender) = sender else {
            self.drop_event(&event, DispatchError::PoolClosed);
            return;
        };

        let slot = match self.slots.clone().try_acquire_owned() {
            Ok(slot) => slot,
            Err(TryAcquireError::NoPermits) => {
                self.drop_event(&event, DispatchError::QueueFull);
                return;
            }
            Err(TryAcquireError::Closed) => {
                self.drop_event(&event, DispatchError::PoolClosed);
                return;
            }
        };

        let work = Work {
            event,
            router,
            _slot: slot,
        };

        match sender.try_send(work) {
            Ok(()) => {
                self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(work)) => self.drop_event(&work.event, DispatchError::QueueFull),
            Err(TrySendError::Closed(work)) => {
                self.drop_event(&work.event, DispatchError::PoolClosed)
            }
        }
    }

    async fn shutdown(&self, deadline: Duration) -> Result<(), ShutdownError> {
        if self.closing.swap(true, Ordering::AcqRel) {
            return Err(ShutdownError::AlreadyShutDown);
        }

        info!(deadline_ms = deadline.as_millis() as u64, "Worker pool shutting down");

        // Dropping the last sender lets workers drain the queue and exit.
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        self.slots.close();
        self.tracker.close();

        match tokio::time::timeout(deadline, self.tracker.wait()).await {
            Ok(()) => {
                info!("Worker pool drained");
                Ok(())
            }
            Err(_) => {
                warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Worker pool shutdown deadline exceeded"
                );
                Err(ShutdownError::DeadlineExceeded { deadline })
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Work>>>,
    shared: Arc<Shared>,
) {
    debug!(worker, "Worker started");

    loop {
        let work = {
            let mut guard = receiver.lock().await;
            guard.recv().await
        };

        let Some(work) = work else { break };
        shared.process(worker, work).await;
    }

    debug!(worker, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_saturates() {
        let delay = backoff_delay(Duration::from_secs(1), 200);
        assert_eq!(delay, Duration::from_secs(1).saturating_mul(u32::MAX));
        assert_eq!(backoff_delay(Duration::MAX, 5), Duration::MAX);
    }

    #[test]
    fn test_config_defaults() {
        let config = PoolConfig::new(2, 0);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_base_delay, DEFAULT_RETRY_BASE_DELAY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_workers() {
        let err = PoolConfig::new(0, 10).validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_config_rejects_oversized_capacity() {
        let err = PoolConfig::new(1, Semaphore::MAX_PERMITS).validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = PoolConfig::new(usize::MAX, usize::MAX).validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        assert!(PoolConfig::new(1, Semaphore::MAX_PERMITS - 1).validate().is_ok());
    }

    #[tokio::test]
    async fn test_new_rejects_oversized_capacity() {
        assert!(WorkerPool::new(PoolConfig::new(4, 5_000_000_000_000_000_000)).is_err());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_new_rejects_zero_workers() {
        assert!(WorkerPool::new(PoolConfig::new(0, 10)).is_err());
    }

    #[tokio::test]
    async fn test_second_shutdown_is_rejected() {
        let pool = WorkerPool::new(PoolConfig::new(1, 1)).unwrap();

        assert_eq!(pool.shutdown(Duration::from_secs(1)).await, Ok(()));
        assert!(pool.is_closed());
        assert_eq!(
            pool.shutdown(Duration::from_secs(1)).await,
            Err(ShutdownError::AlreadyShutDown)
        );
    }
}
