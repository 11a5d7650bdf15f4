//! Log Handler - Structured logging of events.
//!
//! The [`LogHandler`] records every event it receives with the `tracing`
//! crate. It is the natural fallback for topics nobody subscribed a
//! dedicated handler to.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopify_webhooks::handler::LogHandler;
//!
//! router.fallback(LogHandler::with_prefix("unhandled"));
//! ```

use super::{Handler, HandlerError};
use crate::event::Event;
use async_trait::async_trait;
use tracing::info;

/// A handler that logs events and always succeeds.
#[derive(Debug, Clone)]
pub struct LogHandler {
    /// Prefix for log messages
    prefix: String,
}

impl LogHandler {
    pub fn new() -> Self {
        Self {
            prefix: "webhook".to_string(),
        }
    }

    /// Create a LogHandler with a custom prefix
    ///
    /// The prefix appears in log messages, useful for distinguishing
    /// different log handlers (e.g., "audit", "unhandled")
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for LogHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for LogHandler {
    fn name(&self) -> &str {
        "log"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        info!(
            prefix = %self.prefix,
            topic = %event.topic(),
            shop = %event.shop_domain(),
            event_id = %event.event_id(),
            body_bytes = event.body.len(),
            "[{}] Received: {}",
            self.prefix,
            event.topic()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Metadata;

    #[tokio::test]
    async fn test_log_handler() {
        let handler = LogHandler::new();
        let event = Event::new(Metadata::new("orders/create", "evt-1"), "{}");

        assert!(handler.handle(&event).await.is_ok());
        assert_eq!(handler.name(), "log");
        assert_eq!(handler.prefix(), "webhook");
    }

    #[tokio::test]
    async fn test_log_handler_with_prefix() {
        let handler = LogHandler::with_prefix("audit");
        let event = Event::new(Metadata::new("shop/redact", "evt-2"), "{}");

        assert!(handler.handle(&event).await.is_ok());
        assert_eq!(handler.prefix(), "audit");
    }
}
