//! Webhook receiver - deduplicate, then dispatch or submit.
//!
//! [`WebhookReceiver`] is the transport-independent entry point for a
//! verified event. It ties the [`Router`], an optional [`AsyncProcessor`]
//! and an optional [`IdempotencyStore`] together:
//!
//! 1. If a store is configured and the event id was already stored, the
//!    event is a redelivery: acknowledge without processing.
//! 2. Hand the event to the processor, or dispatch it inline when there is
//!    no processor.
//! 3. Record the event id in the store.
//!
//! Store failures never reject an event: processing a webhook twice is
//! preferable to losing it.

use crate::dedup::IdempotencyStore;
use crate::event::Event;
use crate::pool::AsyncProcessor;
use crate::router::Router;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of [`WebhookReceiver::receive`]. Both variants are acknowledged
/// with a success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// The event was dispatched or handed to the processor
    Accepted,
    /// The event id was already stored; nothing ran
    Duplicate,
}

/// Receives verified events and routes them.
#[derive(Clone)]
pub struct WebhookReceiver {
    router: Arc<Router>,
    processor: Option<Arc<dyn AsyncProcessor>>,
    dedup: Option<Arc<dyn IdempotencyStore>>,
}

impl WebhookReceiver {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            processor: None,
            dedup: None,
        }
    }

    /// Process events in the background with `processor`.
    pub fn with_processor(mut self, processor: Arc<dyn AsyncProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Skip events whose id is already in `store`.
    pub fn with_idempotency_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.dedup = Some(store);
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn is_async(&self) -> bool {
        self.processor.is_some()
    }

    /// Deduplicate and process one event.
    ///
    /// Handler failures are not returned: they are reported through the
    /// router and pool observers. Events without an event id bypass the
    /// idempotency store.
    pub async fn receive(&self, event: Event) -> Receipt {
        let dedup = self
            .dedup
            .as_ref()
            .filter(|_| !event.event_id().is_empty());

        if let Some(store) = dedup {
            match store.exists(event.event_id()).await {
                Ok(true) => {
                    debug!(
                        topic = %event.topic(),
                        event_id = %event.event_id(),
                        "Duplicate delivery, skipping"
                    );
                    return Receipt::Duplicate;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        event_id = %event.event_id(),
                        error = %e,
                        "Idempotency check failed, processing anyway"
                    );
                }
            }
        }

        let event_id = event.event_id().to_string();

        match &self.processor {
            Some(processor) => processor.submit(event, self.router.clone()),
            None => {
                if let Err(e) = self.router.dispatch(&event).await {
                    debug!(
                        topic = %event.topic(),
                        event_id = %event_id,
                        error = %e,
                        "Inline dispatch failed"
                    );
                }
            }
        }

        if let Some(store) = dedup {
            if let Err(e) = store.store(&event_id).await {
                warn!(
                    event_id = %event_id,
                    error = %e,
                    "Failed to record event id"
                );
            }
        }

        Receipt::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{MemoryStore, StoreError};
    use crate::event::Metadata;
    use crate::handler::{handler_fn, HandlerError};
    use crate::topic::Topic;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_router(counter: Arc<AtomicUsize>) -> Arc<Router> {
        let router = Router::new();
        router.handle(
            Topic::ORDERS_CREATE,
            handler_fn(move |_event: Event| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        Arc::new(router)
    }

    fn order_event(event_id: &str) -> Event {
        Event::new(Metadata::new(Topic::ORDERS_CREATE, event_id), "{}")
    }

    struct BrokenStore {
        stores: AtomicUsize,
    }

    #[async_trait]
    impl IdempotencyStore for BrokenStore {
        async fn exists(&self, _event_id: &str) -> Result<bool, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn store(&self, _event_id: &str) -> Result<(), StoreError> {
            self.stores.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_inline_dispatch_without_store() {
        let calls = Arc::new(AtomicUsize::new(0));
        let receiver = WebhookReceiver::new(counting_router(calls.clone()));

        assert_eq!(receiver.receive(order_event("evt-1")).await, Receipt::Accepted);
        assert_eq!(receiver.receive(order_event("evt-1")).await, Receipt::Accepted);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!receiver.is_async());
    }

    #[tokio::test]
    async fn test_duplicate_event_processed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
        let receiver = WebhookReceiver::new(counting_router(calls.clone()))
            .with_idempotency_store(store.clone());

        assert_eq!(receiver.receive(order_event("evt-1")).await, Receipt::Accepted);
        assert_eq!(receiver.receive(order_event("evt-1")).await, Receipt::Duplicate);
        assert_eq!(receiver.receive(order_event("evt-2")).await, Receipt::Accepted);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        store.close().await;
    }

    #[tokio::test]
    async fn test_failed_handler_still_records_event() {
        let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
        let router = Router::new();
        router.handle(
            Topic::ORDERS_CREATE,
            handler_fn(|_event: Event| async move { Err(HandlerError::failed("boom")) }),
        );
        let receiver =
            WebhookReceiver::new(Arc::new(router)).with_idempotency_store(store.clone());

        assert_eq!(receiver.receive(order_event("evt-1")).await, Receipt::Accepted);
        assert!(store.exists("evt-1").await.unwrap());
        store.close().await;
    }

    #[tokio::test]
    async fn test_store_errors_do_not_drop_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(BrokenStore {
            stores: AtomicUsize::new(0),
        });
        let receiver = WebhookReceiver::new(counting_router(calls.clone()))
            .with_idempotency_store(store.clone());

        assert_eq!(receiver.receive(order_event("evt-1")).await, Receipt::Accepted);
        assert_eq!(receiver.receive(order_event("evt-1")).await, Receipt::Accepted);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.stores.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_event_id_bypasses_store() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
        let receiver = WebhookReceiver::new(counting_router(calls.clone()))
            .with_idempotency_store(store.clone());

        receiver.receive(order_event("")).await;
        receiver.receive(order_event("")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
        store.close().await;
    }
}
