//! Handler system.
//!
//! Handlers are the application code an event is routed to. The [`Handler`]
//! trait defines the interface; [`handler_fn`] adapts an async closure so
//! most applications never implement the trait by hand.
//!
//! ## Built-in Handlers
//!
//! - [`LogHandler`]: structured logging of events (useful as a fallback)
//!
//! ## Creating Handlers
//!
//! ```rust,ignore
//! use shopify_webhooks::{handler_fn, Event, HandlerError, Router, Topic};
//! use shopify_webhooks::payload::Order;
//!
//! let router = Router::new();
//! router.handle(Topic::ORDERS_CREATE, handler_fn(|event: Event| async move {
//!     let order: Order = event.decode()?;
//!     tracing::info!(order = order.order_number, "new order");
//!     Ok(())
//! }));
//! ```

pub mod log;

use crate::event::Event;
use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

pub use log::LogHandler;

/// Boxed error for handler failures that don't fit the other variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reasons a handler can fail.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The body could not be decoded into the expected payload
    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Application-level failure with a message
    #[error("{0}")]
    Failed(String),

    /// Any other error raised by application code
    #[error(transparent)]
    Other(BoxError),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn other(error: impl Into<BoxError>) -> Self {
        Self::Other(error.into())
    }
}

/// Application code invoked for an event.
///
/// Handlers are registered once and invoked many times, possibly from
/// several workers at once, so they must be `Send + Sync`.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "handler"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

/// A [`Handler`] backed by an async closure. Built by [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure taking an owned [`Event`] as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        "fn"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        (self.f)(event.clone()).await
    }
}
