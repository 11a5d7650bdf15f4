//! Helpers for testing webhook handlers.
//!
//! Build requests that pass signature verification so handlers and whole
//! axum apps can be exercised without the platform.
//!
//! ```rust,ignore
//! use shopify_webhooks::testutil::signed_request;
//! use tower::ServiceExt;
//!
//! let req = signed_request("test-secret", Topic::ORDERS_CREATE, "mystore.myshopify.com", br#"{"id":1}"#);
//! let response = app.oneshot(req).await?;
//! ```

use crate::event::{
    HEADER_API_VERSION, HEADER_EVENT_ID, HEADER_HMAC_SHA256, HEADER_SHOP_DOMAIN, HEADER_TOPIC,
    HEADER_TRIGGERED_AT, HEADER_WEBHOOK_ID,
};
use crate::http::DEFAULT_WEBHOOK_PATH;
use crate::topic::Topic;
use crate::verify::VerifyError;
use axum::body::Body;
use axum::http::{header, Method, Request};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// API version stamped on test requests.
pub const TEST_API_VERSION: &str = "2025-01";

static EVENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Base64 HMAC-SHA256 of `payload`, as the platform would send it.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String, VerifyError> {
    crate::verify::sign_payload(secret, payload)
}

/// Next unique test event id (`test-event-N`).
pub fn next_event_id() -> String {
    format!("test-event-{}", EVENT_COUNTER.fetch_add(1, Ordering::Relaxed) + 1)
}

/// A signed `POST /webhooks` request with a fresh event id.
///
/// # Panics
///
/// Panics if the request cannot be built, e.g. when `shop_domain` contains
/// characters that are not valid in a header.
pub fn signed_request(
    secret: &str,
    topic: impl Into<Topic>,
    shop_domain: &str,
    body: impl Into<Vec<u8>>,
) -> Request<Body> {
    signed_request_with_id(secret, topic, shop_domain, &next_event_id(), body)
}

/// Like [`signed_request`] with an explicit event id, for redelivery tests.
///
/// # Panics
///
/// Panics if the request cannot be built.
pub fn signed_request_with_id(
    secret: &str,
    topic: impl Into<Topic>,
    shop_domain: &str,
    event_id: &str,
    body: impl Into<Vec<u8>>,
) -> Request<Body> {
    let body = body.into();
    let signature = crate::verify::sign_payload(secret, &body)
        .unwrap_or_else(|e| panic!("failed to sign test payload: {e}"));
    let topic = topic.into();

    Request::builder()
        .method(Method::POST)
        .uri(DEFAULT_WEBHOOK_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .header(HEADER_TOPIC, topic.as_str())
        .header(HEADER_HMAC_SHA256, signature)
        .header(HEADER_SHOP_DOMAIN, shop_domain)
        .header(HEADER_EVENT_ID, event_id)
        .header(HEADER_WEBHOOK_ID, "test-webhook-id")
        .header(
            HEADER_TRIGGERED_AT,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        )
        .header(HEADER_API_VERSION, TEST_API_VERSION)
        .body(Body::from(body))
        .unwrap_or_else(|e| panic!("failed to build test request: {e}"))
}

/// A signed request whose body is `payload` serialized as JSON.
///
/// # Panics
///
/// Panics if `payload` cannot be serialized.
pub fn signed_json_request<T: Serialize>(
    secret: &str,
    topic: impl Into<Topic>,
    shop_domain: &str,
    payload: &T,
) -> Request<Body> {
    let body = serde_json::to_vec(payload)
        .unwrap_or_else(|e| panic!("failed to serialize test payload: {e}"));
    signed_request(secret, topic, shop_domain, body)
}
