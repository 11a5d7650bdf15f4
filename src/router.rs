//! Event Router - maps topics to handlers.
//!
//! The [`Router`] dispatches each event to exactly one handler: the one
//! registered for the event's topic, or the fallback when nothing matches.
//!
//! # Matching
//!
//! ```text
//! Event (topic: "orders/create")
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │            ROUTER                   │
//! │                                     │
//! │  1. handlers["orders/create"]? YES  │──► handler
//! │  2. fallback set?                   │──► fallback
//! │  3. otherwise                       │──► UnhandledTopic
//! └─────────────────────────────────────┘
//! ```
//!
//! A handler failure is reported to the error observer (if any) before the
//! error is returned to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopify_webhooks::{handler_fn, Event, Router, Topic};
//! use shopify_webhooks::handler::LogHandler;
//!
//! let router = Router::new()
//!     .with_error_observer(|event, error| {
//!         tracing::error!(topic = %event.topic(), %error, "webhook failed");
//!     });
//!
//! router.handle(Topic::ORDERS_CREATE, handler_fn(|event: Event| async move { Ok(()) }));
//! router.fallback(LogHandler::with_prefix("unhandled"));
//! ```

use crate::event::Event;
use crate::handler::{Handler, HandlerError};
use crate::topic::Topic;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, warn};

/// Callback invoked with the event and the error whenever processing fails.
pub type ErrorObserver = Arc<dyn Fn(&Event, &DispatchError) + Send + Sync>;

/// Errors produced while dispatching an event.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No handler is registered for the topic and no fallback is set
    #[error("unhandled topic: {0}")]
    UnhandledTopic(Topic),

    /// The handler ran and failed
    #[error("handler for topic '{topic}' failed: {source}")]
    Handler {
        topic: Topic,
        #[source]
        source: HandlerError,
    },

    /// The handler panicked; the event is not retried
    #[error("handler for topic '{topic}' panicked: {message}")]
    HandlerPanicked { topic: Topic, message: String },

    /// The worker pool queue was full; the event was dropped
    #[error("worker pool queue full, event dropped")]
    QueueFull,

    /// The worker pool was shut down; the event was dropped
    #[error("worker pool is shut down, event dropped")]
    PoolClosed,
}

/// Registration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("handler already registered for topic '{0}'")]
    DuplicateTopic(Topic),
}

#[derive(Default)]
struct Routes {
    handlers: HashMap<Topic, Arc<dyn Handler>>,
    fallback: Option<Arc<dyn Handler>>,
}

/// Routes events to the handler registered for their topic.
///
/// # Thread Safety
///
/// Registration and dispatch take `&self` and may run concurrently. Lookups
/// share a read lock; registration takes the write lock, so a dispatch never
/// observes a half-registered handler. The handler itself runs after the
/// lock is released.
pub struct Router {
    routes: RwLock<Routes>,
    observer: Option<ErrorObserver>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(Routes::default()),
            observer: None,
        }
    }

    /// Set the callback invoked whenever a handler returns an error.
    pub fn with_error_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Event, &DispatchError) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Register a handler for a topic.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered for `topic`. Duplicate
    /// registration is a startup configuration bug; use [`Router::try_handle`]
    /// to get an error instead.
    pub fn handle(&self, topic: impl Into<Topic>, handler: impl Handler + 'static) {
        if let Err(err) = self.try_handle(topic, handler) {
            panic!("{err}");
        }
    }

    /// Register a handler for a topic, failing if one is already registered.
    pub fn try_handle(
        &self,
        topic: impl Into<Topic>,
        handler: impl Handler + 'static,
    ) -> Result<(), RouterError> {
        let topic = topic.into();
        let mut routes = self.write();

        if routes.handlers.contains_key(&topic) {
            return Err(RouterError::DuplicateTopic(topic));
        }

        debug!(
            topic = %topic,
            handler = %handler.name(),
            "Registering handler"
        );
        routes.handlers.insert(topic, Arc::new(handler));
        Ok(())
    }

    /// Set the handler for topics without a registered handler.
    ///
    /// Replaces any previous fallback.
    pub fn fallback(&self, handler: impl Handler + 'static) {
        debug!(handler = %handler.name(), "Setting fallback handler");
        self.write().fallback = Some(Arc::new(handler));
    }

    pub fn has_handler(&self, topic: &Topic) -> bool {
        self.read().handlers.contains_key(topic)
    }

    pub fn has_fallback(&self) -> bool {
        self.read().fallback.is_some()
    }

    /// Number of registered topics (the fallback is not counted).
    pub fn handler_count(&self) -> usize {
        self.read().handlers.len()
    }

    /// Snapshot of the registered topics, in no particular order.
    pub fn topics(&self) -> Vec<Topic> {
        self.read().handlers.keys().cloned().collect()
    }

    /// Route an event to its handler.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnhandledTopic`] when neither a handler nor a
    ///   fallback exists; no handler runs.
    /// - [`DispatchError::Handler`] when the handler fails. The error
    ///   observer has already been called with the same error.
    pub async fn dispatch(&self, event: &Event) -> Result<(), DispatchError> {
        let topic = event.topic();

        let (handler, is_fallback) = {
            let routes = self.read();
            match routes.handlers.get(topic) {
                Some(handler) => (Some(handler.clone()), false),
                None => (routes.fallback.clone(), true),
            }
        };

        let Some(handler) = handler else {
            warn!(
                topic = %topic,
                event_id = %event.event_id(),
                "No handler registered for topic (and no fallback set)"
            );
            return Err(DispatchError::UnhandledTopic(topic.clone()));
        };

        debug!(
            topic = %topic,
            event_id = %event.event_id(),
            handler = %handler.name(),
            fallback = is_fallback,
            "Dispatching event"
        );

        match handler.handle(event).await {
            Ok(()) => {
                debug!(
                    topic = %topic,
                    event_id = %event.event_id(),
                    "Event handled"
                );
                Ok(())
            }
            Err(source) => {
                let error = DispatchError::Handler {
                    topic: topic.clone(),
                    source,
                };

                warn!(
                    topic = %topic,
                    event_id = %event.event_id(),
                    handler = %handler.name(),
                    error = %error,
                    "Handler failed"
                );

                if let Some(observer) = &self.observer {
                    observer(event, &error);
                }

                Err(error)
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Routes> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Routes> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
