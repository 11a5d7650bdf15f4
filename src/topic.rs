//! Webhook topics.
//!
//! A [`Topic`] is the routing key of an event, taken verbatim from the
//! `X-Shopify-Topic` header. The associated constants cover every topic this
//! crate knows about; unknown topics are still routable, [`Topic::validate`]
//! is advisory only.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Returned by [`Topic::validate`] for topics outside the known catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown topic '{0}'")]
pub struct UnknownTopic(pub Topic);

/// A webhook topic such as `orders/create`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(Cow<'static, str>);

impl Topic {
    // Orders
    pub const ORDERS_CREATE: Topic = Topic::from_static("orders/create");
    pub const ORDERS_UPDATE: Topic = Topic::from_static("orders/update");
    pub const ORDERS_DELETE: Topic = Topic::from_static("orders/delete");
    pub const ORDERS_CANCELLED: Topic = Topic::from_static("orders/cancelled");
    pub const ORDERS_FULFILLED: Topic = Topic::from_static("orders/fulfilled");
    pub const ORDERS_PAID: Topic = Topic::from_static("orders/paid");
    pub const ORDERS_PARTIALLY_FULFILLED: Topic =
        Topic::from_static("orders/partially_fulfilled");

    // Products
    pub const PRODUCTS_CREATE: Topic = Topic::from_static("products/create");
    pub const PRODUCTS_UPDATE: Topic = Topic::from_static("products/update");
    pub const PRODUCTS_DELETE: Topic = Topic::from_static("products/delete");

    // Customers
    pub const CUSTOMERS_CREATE: Topic = Topic::from_static("customers/create");
    pub const CUSTOMERS_UPDATE: Topic = Topic::from_static("customers/update");
    pub const CUSTOMERS_DELETE: Topic = Topic::from_static("customers/delete");
    pub const CUSTOMERS_ENABLE: Topic = Topic::from_static("customers/enable");
    pub const CUSTOMERS_DISABLE: Topic = Topic::from_static("customers/disable");

    // Collections
    pub const COLLECTIONS_CREATE: Topic = Topic::from_static("collections/create");
    pub const COLLECTIONS_UPDATE: Topic = Topic::from_static("collections/update");
    pub const COLLECTIONS_DELETE: Topic = Topic::from_static("collections/delete");

    // Carts
    pub const CARTS_CREATE: Topic = Topic::from_static("carts/create");
    pub const CARTS_UPDATE: Topic = Topic::from_static("carts/update");

    // Checkouts
    pub const CHECKOUTS_CREATE: Topic = Topic::from_static("checkouts/create");
    pub const CHECKOUTS_UPDATE: Topic = Topic::from_static("checkouts/update");
    pub const CHECKOUTS_DELETE: Topic = Topic::from_static("checkouts/delete");

    // Refunds
    pub const REFUNDS_CREATE: Topic = Topic::from_static("refunds/create");

    // App lifecycle
    pub const APP_UNINSTALLED: Topic = Topic::from_static("app/uninstalled");

    // Mandatory GDPR topics
    pub const CUSTOMERS_DATA_REQUEST: Topic = Topic::from_static("customers/data_request");
    pub const CUSTOMERS_REDACT: Topic = Topic::from_static("customers/redact");
    pub const SHOP_REDACT: Topic = Topic::from_static("shop/redact");

    /// Every topic in the known catalog.
    pub const KNOWN: &'static [Topic] = &[
        Topic::ORDERS_CREATE,
        Topic::ORDERS_UPDATE,
        Topic::ORDERS_DELETE,
        Topic::ORDERS_CANCELLED,
        Topic::ORDERS_FULFILLED,
        Topic::ORDERS_PAID,
        Topic::ORDERS_PARTIALLY_FULFILLED,
        Topic::PRODUCTS_CREATE,
        Topic::PRODUCTS_UPDATE,
        Topic::PRODUCTS_DELETE,
        Topic::CUSTOMERS_CREATE,
        Topic::CUSTOMERS_UPDATE,
        Topic::CUSTOMERS_DELETE,
        Topic::CUSTOMERS_ENABLE,
        Topic::CUSTOMERS_DISABLE,
        Topic::COLLECTIONS_CREATE,
        Topic::COLLECTIONS_UPDATE,
        Topic::COLLECTIONS_DELETE,
        Topic::CARTS_CREATE,
        Topic::CARTS_UPDATE,
        Topic::CHECKOUTS_CREATE,
        Topic::CHECKOUTS_UPDATE,
        Topic::CHECKOUTS_DELETE,
        Topic::REFUNDS_CREATE,
        Topic::APP_UNINSTALLED,
        Topic::CUSTOMERS_DATA_REQUEST,
        Topic::CUSTOMERS_REDACT,
        Topic::SHOP_REDACT,
    ];

    /// Create a topic from any string.
    pub fn new(topic: impl Into<String>) -> Self {
        Self(Cow::Owned(topic.into()))
    }

    const fn from_static(topic: &'static str) -> Self {
        Self(Cow::Borrowed(topic))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check the topic against the known catalog.
    pub fn validate(&self) -> Result<(), UnknownTopic> {
        if Self::KNOWN.contains(self) {
            Ok(())
        } else {
            Err(UnknownTopic(self.clone()))
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(topic: &str) -> Self {
        Self::new(topic)
    }
}

impl From<String> for Topic {
    fn from(topic: String) -> Self {
        Self::new(topic)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_and_static_topics_compare_equal() {
        assert_eq!(Topic::new("orders/create"), Topic::ORDERS_CREATE);
        assert_eq!(Topic::from("shop/redact"), Topic::SHOP_REDACT);
    }

    #[test]
    fn test_validate_known_topics() {
        for topic in Topic::KNOWN {
            assert!(topic.validate().is_ok(), "{topic} should be known");
        }
    }

    #[test]
    fn test_validate_unknown_topic() {
        let err = Topic::new("orders/teleported").validate().unwrap_err();
        assert_eq!(err, UnknownTopic(Topic::new("orders/teleported")));
        assert_eq!(err.to_string(), "unknown topic 'orders/teleported'");
    }

    #[test]
    fn test_topic_serde_is_transparent() {
        let json = serde_json::to_string(&Topic::APP_UNINSTALLED).unwrap();
        assert_eq!(json, "\"app/uninstalled\"");

        let topic: Topic = serde_json::from_str("\"carts/update\"").unwrap();
        assert_eq!(topic, Topic::CARTS_UPDATE);
    }
}
