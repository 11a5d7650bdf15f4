//! Core event types.
//!
//! An [`Event`] is a verified webhook delivery: the [`Metadata`] extracted
//! from the `X-Shopify-*` headers plus the raw body bytes. The body is kept
//! exactly as received so it can be re-verified, stored or decoded lazily by
//! handlers with [`Event::decode`].

use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topic::Topic;

pub const HEADER_TOPIC: &str = "x-shopify-topic";
pub const HEADER_HMAC_SHA256: &str = "x-shopify-hmac-sha256";
pub const HEADER_SHOP_DOMAIN: &str = "x-shopify-shop-domain";
pub const HEADER_WEBHOOK_ID: &str = "x-shopify-webhook-id";
pub const HEADER_EVENT_ID: &str = "x-shopify-event-id";
pub const HEADER_TRIGGERED_AT: &str = "x-shopify-triggered-at";
pub const HEADER_API_VERSION: &str = "x-shopify-api-version";

/// Errors raised while extracting [`Metadata`] from request headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("missing X-Shopify-Topic header")]
    MissingTopic,

    #[error("missing X-Shopify-Hmac-Sha256 header")]
    MissingSignature,
}

/// Delivery metadata carried in the webhook headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Routing key (`X-Shopify-Topic`)
    pub topic: Topic,

    /// Base64 HMAC-SHA256 of the body (`X-Shopify-Hmac-Sha256`)
    #[serde(default)]
    pub hmac_sha256: String,

    /// Shop the event belongs to (`X-Shopify-Shop-Domain`)
    #[serde(default)]
    pub shop_domain: String,

    /// Subscription that produced the delivery (`X-Shopify-Webhook-Id`)
    #[serde(default)]
    pub webhook_id: String,

    /// Stable across redeliveries; used as the deduplication key
    /// (`X-Shopify-Event-Id`)
    #[serde(default)]
    pub event_id: String,

    /// When the platform triggered the event (`X-Shopify-Triggered-At`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,

    /// Payload schema version (`X-Shopify-Api-Version`)
    #[serde(default)]
    pub api_version: String,
}

impl Metadata {
    /// Create metadata with the two fields the engine relies on.
    pub fn new(topic: impl Into<Topic>, event_id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            hmac_sha256: String::new(),
            shop_domain: String::new(),
            webhook_id: String::new(),
            event_id: event_id.into(),
            triggered_at: None,
            api_version: String::new(),
        }
    }

    pub fn with_shop_domain(mut self, shop_domain: impl Into<String>) -> Self {
        self.shop_domain = shop_domain.into();
        self
    }

    pub fn with_webhook_id(mut self, webhook_id: impl Into<String>) -> Self {
        self.webhook_id = webhook_id.into();
        self
    }

    pub fn with_signature(mut self, hmac_sha256: impl Into<String>) -> Self {
        self.hmac_sha256 = hmac_sha256.into();
        self
    }

    pub fn with_triggered_at(mut self, triggered_at: DateTime<Utc>) -> Self {
        self.triggered_at = Some(triggered_at);
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Extract metadata from webhook request headers.
    ///
    /// The topic and signature headers are required. A malformed
    /// `X-Shopify-Triggered-At` is ignored rather than rejected; every other
    /// header defaults to an empty string.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, MetadataError> {
        let topic = header_str(headers, HEADER_TOPIC).ok_or(MetadataError::MissingTopic)?;
        let hmac_sha256 =
            header_str(headers, HEADER_HMAC_SHA256).ok_or(MetadataError::MissingSignature)?;

        let triggered_at = header_str(headers, HEADER_TRIGGERED_AT)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Ok(Self {
            topic: Topic::new(topic),
            hmac_sha256: hmac_sha256.to_string(),
            shop_domain: header_string(headers, HEADER_SHOP_DOMAIN),
            webhook_id: header_string(headers, HEADER_WEBHOOK_ID),
            event_id: header_string(headers, HEADER_EVENT_ID),
            triggered_at,
            api_version: header_string(headers, HEADER_API_VERSION),
        })
    }
}

/// Non-empty, valid UTF-8 header value.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

fn header_string(headers: &HeaderMap, name: &str) -> String {
    header_str(headers, name).unwrap_or_default().to_string()
}

/// A verified webhook event.
///
/// Cloning is cheap: the body is a reference-counted byte buffer.
#[derive(Debug, Clone)]
pub struct Event {
    pub metadata: Metadata,
    pub body: Bytes,
}

impl Event {
    pub fn new(metadata: Metadata, body: impl Into<Bytes>) -> Self {
        Self {
            metadata,
            body: body.into(),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.metadata.topic
    }

    pub fn event_id(&self) -> &str {
        &self.metadata.event_id
    }

    pub fn shop_domain(&self) -> &str {
        &self.metadata.shop_domain
    }

    /// Decode the raw body as JSON into `T`.
    ///
    /// ```rust,ignore
    /// let order: Order = event.decode()?;
    /// ```
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};
    use serde_json::{json, Value};

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_from_headers_full() {
        let map = headers(&[
            ("X-Shopify-Topic", "orders/create"),
            ("X-Shopify-Hmac-Sha256", "c2lnbmF0dXJl"),
            ("X-Shopify-Shop-Domain", "store.myshopify.com"),
            ("X-Shopify-Webhook-Id", "wh-1"),
            ("X-Shopify-Event-Id", "evt-1"),
            ("X-Shopify-Triggered-At", "2025-01-15T10:00:00Z"),
            ("X-Shopify-Api-Version", "2025-01"),
        ]);

        let meta = Metadata::from_headers(&map).unwrap();
        assert_eq!(meta.topic, Topic::ORDERS_CREATE);
        assert_eq!(meta.hmac_sha256, "c2lnbmF0dXJl");
        assert_eq!(meta.shop_domain, "store.myshopify.com");
        assert_eq!(meta.webhook_id, "wh-1");
        assert_eq!(meta.event_id, "evt-1");
        assert_eq!(
            meta.triggered_at.unwrap().to_rfc3339(),
            "2025-01-15T10:00:00+00:00"
        );
        assert_eq!(meta.api_version, "2025-01");
    }

    #[test]
    fn test_from_headers_missing_topic() {
        let map = headers(&[("X-Shopify-Hmac-Sha256", "sig")]);
        assert_eq!(
            Metadata::from_headers(&map),
            Err(MetadataError::MissingTopic)
        );
    }

    #[test]
    fn test_from_headers_missing_signature() {
        let map = headers(&[("X-Shopify-Topic", "orders/create")]);
        assert_eq!(
            Metadata::from_headers(&map),
            Err(MetadataError::MissingSignature)
        );
    }

    #[test]
    fn test_from_headers_ignores_bad_timestamp() {
        let map = headers(&[
            ("X-Shopify-Topic", "orders/create"),
            ("X-Shopify-Hmac-Sha256", "sig"),
            ("X-Shopify-Triggered-At", "yesterday"),
        ]);

        let meta = Metadata::from_headers(&map).unwrap();
        assert!(meta.triggered_at.is_none());
        assert!(meta.event_id.is_empty());
        assert!(meta.shop_domain.is_empty());
    }

    #[test]
    fn test_event_decode() {
        let event = Event::new(
            Metadata::new(Topic::ORDERS_CREATE, "evt-1"),
            serde_json::to_vec(&json!({"id": 42, "email": "a@b.c"})).unwrap(),
        );

        let value: Value = event.decode().unwrap();
        assert_eq!(value["id"], 42);
        assert_eq!(event.topic(), &Topic::ORDERS_CREATE);
        assert_eq!(event.event_id(), "evt-1");
    }

    #[test]
    fn test_event_decode_invalid_json() {
        let event = Event::new(Metadata::new("orders/create", "evt-2"), "not json");
        assert!(event.decode::<Value>().is_err());
    }

    #[test]
    fn test_metadata_builder() {
        let meta = Metadata::new("products/update", "evt-3")
            .with_shop_domain("shop.myshopify.com")
            .with_webhook_id("wh-9")
            .with_api_version("2025-01");

        assert_eq!(meta.topic, Topic::PRODUCTS_UPDATE);
        assert_eq!(meta.shop_domain, "shop.myshopify.com");
        assert_eq!(meta.webhook_id, "wh-9");
        assert_eq!(meta.api_version, "2025-01");
    }
}
