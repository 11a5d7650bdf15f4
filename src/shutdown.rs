//! Graceful shutdown of the webhook server.
//!
//! Order of events on SIGINT/SIGTERM:
//!
//! 1. [`ShutdownSignal::listen`] observes the OS signal and trips the token.
//! 2. `axum::serve(..).with_graceful_shutdown(signal.triggered())` stops
//!    accepting connections and finishes in-flight requests.
//! 3. [`ShutdownSignal::drain`] closes the background processor and waits up
//!    to the drain timeout for accepted events.
//!
//! ```rust,ignore
//! let shutdown = ShutdownSignal::new(Duration::from_secs(30));
//! tokio::spawn(shutdown.clone().listen());
//!
//! axum::serve(tcp, app)
//!     .with_graceful_shutdown(shutdown.clone().triggered_owned())
//!     .await?;
//!
//! shutdown.drain(pool.as_ref()).await?;
//! ```

use crate::pool::{AsyncProcessor, ShutdownError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Drain timeout used by [`ShutdownSignal::default`].
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloneable shutdown trigger shared by the server and the worker pool.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    token: CancellationToken,
    drain_timeout: Duration,
}

impl ShutdownSignal {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            drain_timeout,
        }
    }

    /// Time the background processor gets to finish accepted events.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Wait for Ctrl+C or SIGTERM, then trigger shutdown.
    ///
    /// Returns early if shutdown is triggered some other way. A signal whose
    /// handler cannot be installed is logged and never fires.
    pub async fn listen(self) {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => "SIGINT",
                Err(e) => {
                    error!(error = %e, "Failed to install Ctrl+C handler");
                    std::future::pending().await
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    "SIGTERM"
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending().await
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<&str>();

        let received = tokio::select! {
            name = ctrl_c => name,
            name = terminate => name,
            _ = self.token.cancelled() => return,
        };

        info!(signal = received, "Shutting down webhook server");
        self.token.cancel();
    }

    /// Resolves once shutdown has been triggered, immediately if it already was.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// Owned variant of [`ShutdownSignal::triggered`], for APIs that need a
    /// `'static` future.
    pub async fn triggered_owned(self) {
        self.token.cancelled().await;
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown without an OS signal.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested");
        }
        self.token.cancel();
    }

    /// Close `processor` and wait up to the drain timeout for it to finish.
    pub async fn drain(&self, processor: &dyn AsyncProcessor) -> Result<(), ShutdownError> {
        info!(
            timeout_ms = self.drain_timeout.as_millis() as u64,
            "Draining background processor"
        );

        processor.shutdown(self.drain_timeout).await.map_err(|e| {
            warn!(error = %e, "Background processor did not drain cleanly");
            e
        })
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new(DEFAULT_DRAIN_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Metadata};
    use crate::handler::handler_fn;
    use crate::pool::{PoolConfig, WorkerPool};
    use crate::router::Router;
    use crate::topic::Topic;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_drain_timeout() {
        let signal = ShutdownSignal::default();
        assert_eq!(signal.drain_timeout(), DEFAULT_DRAIN_TIMEOUT);
        assert!(!signal.is_triggered());
    }

    #[tokio::test]
    async fn test_trigger_wakes_every_clone() {
        let signal = ShutdownSignal::new(Duration::from_secs(1));
        let waiters: Vec<_> = (0..3)
            .map(|_| tokio::spawn(signal.clone().triggered_owned()))
            .collect();

        signal.trigger();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_millis(100), waiter)
                .await
                .expect("waiter not woken")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_triggered_after_the_fact() {
        let signal = ShutdownSignal::default();
        signal.trigger();
        signal.trigger();

        let result = tokio::time::timeout(Duration::from_millis(50), signal.triggered()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_listen_returns_on_manual_trigger() {
        let signal = ShutdownSignal::default();
        let listener = tokio::spawn(signal.clone().listen());

        signal.trigger();

        let result = tokio::time::timeout(Duration::from_millis(100), listener).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_drain_finishes_accepted_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let router = Router::new();
        router.handle(
            Topic::APP_UNINSTALLED,
            handler_fn(move |_event: Event| {
                let counter = counter.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        let router = Arc::new(router);

        let pool = WorkerPool::new(PoolConfig::new(1, 4)).unwrap();
        for n in 0..3 {
            let event = Event::new(Metadata::new(Topic::APP_UNINSTALLED, format!("evt-{n}")), "{}");
            pool.submit(event, router.clone());
        }

        let signal = ShutdownSignal::new(Duration::from_secs(2));
        assert_eq!(signal.drain(&pool).await, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert_eq!(
            signal.drain(&pool).await,
            Err(ShutdownError::AlreadyShutDown)
        );
    }
}
