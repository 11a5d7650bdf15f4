//! Mandatory GDPR webhooks.
//!
//! Every public app must subscribe to `customers/data_request`,
//! `customers/redact` and `shop/redact`. Implement [`GdprHandler`] and call
//! [`register_gdpr`]: a missing method is a compile error, so none of the
//! three topics can be forgotten.
//!
//! ```rust,ignore
//! struct Compliance;
//!
//! #[async_trait]
//! impl GdprHandler for Compliance {
//!     async fn customer_data_request(&self, event: &Event, req: CustomerDataRequest) -> Result<(), HandlerError> { ... }
//!     async fn customer_redact(&self, event: &Event, req: CustomerRedact) -> Result<(), HandlerError> { ... }
//!     async fn shop_redact(&self, event: &Event, req: ShopRedact) -> Result<(), HandlerError> { ... }
//! }
//!
//! register_gdpr(&router, Arc::new(Compliance));
//! ```

use crate::event::Event;
use crate::handler::{Handler, HandlerError};
use crate::router::Router;
use crate::topic::Topic;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Payload of `customers/data_request`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerDataRequest {
    pub shop_id: i64,
    pub shop_domain: String,
    pub orders_requested: Vec<i64>,
    pub customer: GdprCustomer,
    pub data_request: GdprDataRequestId,
}

/// Payload of `customers/redact`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerRedact {
    pub shop_id: i64,
    pub shop_domain: String,
    pub customer: GdprCustomer,
    pub orders_to_redact: Vec<i64>,
}

/// Payload of `shop/redact`, sent 48 hours after the app is uninstalled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopRedact {
    pub shop_id: i64,
    pub shop_domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdprCustomer {
    pub id: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdprDataRequestId {
    pub id: i64,
}

/// Handlers for the three mandatory GDPR topics.
#[async_trait]
pub trait GdprHandler: Send + Sync + 'static {
    async fn customer_data_request(
        &self,
        event: &Event,
        request: CustomerDataRequest,
    ) -> Result<(), HandlerError>;

    async fn customer_redact(
        &self,
        event: &Event,
        request: CustomerRedact,
    ) -> Result<(), HandlerError>;

    async fn shop_redact(&self, event: &Event, request: ShopRedact) -> Result<(), HandlerError>;
}

#[derive(Clone, Copy)]
enum GdprTopic {
    CustomerDataRequest,
    CustomerRedact,
    ShopRedact,
}

struct GdprRoute<H> {
    handler: Arc<H>,
    topic: GdprTopic,
}

#[async_trait]
impl<H: GdprHandler> Handler for GdprRoute<H> {
    fn name(&self) -> &str {
        "gdpr"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        match self.topic {
            GdprTopic::CustomerDataRequest => {
                self.handler
                    .customer_data_request(event, event.decode()?)
                    .await
            }
            GdprTopic::CustomerRedact => self.handler.customer_redact(event, event.decode()?).await,
            GdprTopic::ShopRedact => self.handler.shop_redact(event, event.decode()?).await,
        }
    }
}

/// Register `handler` for the three GDPR topics.
///
/// Each payload is decoded before the handler method runs; a body that does
/// not decode fails with [`HandlerError::Decode`].
///
/// # Panics
///
/// Panics if any of the three topics already has a handler.
pub fn register_gdpr<H: GdprHandler>(router: &Router, handler: Arc<H>) {
    let routes = [
        (Topic::CUSTOMERS_DATA_REQUEST, GdprTopic::CustomerDataRequest),
        (Topic::CUSTOMERS_REDACT, GdprTopic::CustomerRedact),
        (Topic::SHOP_REDACT, GdprTopic::ShopRedact),
    ];

    for (topic, kind) in routes {
        router.handle(
            topic,
            GdprRoute {
                handler: handler.clone(),
                topic: kind,
            },
        );
    }
}
