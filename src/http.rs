//! HTTP adapter built on axum.
//!
//! Two ways to receive webhooks:
//!
//! - [`webhook_router`] / [`webhook_route`]: an all-in-one endpoint that
//!   verifies the signature, parses the headers and hands the event to a
//!   [`WebhookReceiver`]. Always answers `200 OK` once the event is verified.
//! - [`verify_middleware`]: verification only. The [`Event`] is inserted into
//!   the request extensions and the request continues to your own handler,
//!   which extracts it with `Extension<Event>`.
//!
//! ```rust,ignore
//! use axum::{middleware, routing::post, Extension};
//! use shopify_webhooks::http::{verify_middleware, VerifyState};
//!
//! let app = axum::Router::new()
//!     .route("/hooks", post(|Extension(event): Extension<Event>| async move { /* ... */ }))
//!     .layer(middleware::from_fn_with_state(VerifyState::new(secret), verify_middleware));
//! ```
//!
//! | Failure                         | Status |
//! |---------------------------------|--------|
//! | missing or invalid signature    | 401    |
//! | missing `X-Shopify-Topic`       | 400    |
//! | unreadable or oversized body    | 400    |
//!
//! Both entry points accept a [`RejectionHandler`] to replace these
//! responses.

use crate::event::{Event, Metadata, MetadataError, HEADER_HMAC_SHA256};
use crate::receiver::WebhookReceiver;
use crate::verify::{verify_signature, VerifyError};
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Path mounted by [`webhook_router`].
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhooks";

/// Largest body [`verify_middleware`] will buffer.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Why a webhook request was refused.
#[derive(Error, Debug)]
pub enum WebhookRejection {
    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("failed to read request body: {0}")]
    Body(String),
}

impl WebhookRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Verify(_) => StatusCode::UNAUTHORIZED,
            Self::Metadata(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::UNAUTHORIZED => "Unauthorized",
            _ => "Bad Request",
        };
        (status, message).into_response()
    }
}

/// Builds the response sent for a refused webhook in place of the default
/// `401 Unauthorized` / `400 Bad Request`.
pub type RejectionHandler = Arc<dyn Fn(&WebhookRejection) -> Response + Send + Sync>;

/// Secret plus optional rejection handler; the state of [`verify_middleware`].
#[derive(Clone)]
pub struct VerifyState {
    secret: WebhookSecret,
    on_rejection: Option<RejectionHandler>,
}

impl VerifyState {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: WebhookSecret::new(secret),
            on_rejection: None,
        }
    }

    /// Answer refused webhooks with `handler` instead of the default status.
    pub fn with_rejection_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WebhookRejection) -> Response + Send + Sync + 'static,
    {
        self.on_rejection = Some(Arc::new(handler));
        self
    }

    pub fn secret(&self) -> &WebhookSecret {
        &self.secret
    }

    fn reject(&self, rejection: WebhookRejection) -> Response {
        match &self.on_rejection {
            Some(handler) => handler(&rejection),
            None => rejection.into_response(),
        }
    }

    /// Buffer the body, then verify it and parse the headers.
    async fn read_event(
        &self,
        headers: &HeaderMap,
        body: Body,
    ) -> Result<Event, WebhookRejection> {
        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| WebhookRejection::Body(e.to_string()))?;

        verify_request(self.secret.as_str(), headers, bytes)
    }
}

impl From<WebhookSecret> for VerifyState {
    fn from(secret: WebhookSecret) -> Self {
        Self {
            secret,
            on_rejection: None,
        }
    }
}

/// Shared state of the all-in-one endpoint.
#[derive(Clone)]
pub struct WebhookState {
    verify: VerifyState,
    receiver: WebhookReceiver,
}

impl WebhookState {
    pub fn new(secret: impl Into<String>, receiver: WebhookReceiver) -> Self {
        Self {
            verify: VerifyState::new(secret),
            receiver,
        }
    }

    /// See [`VerifyState::with_rejection_handler`].
    pub fn with_rejection_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WebhookRejection) -> Response + Send + Sync + 'static,
    {
        self.verify = self.verify.with_rejection_handler(handler);
        self
    }

    pub fn receiver(&self) -> &WebhookReceiver {
        &self.receiver
    }
}

/// Client secret used as HMAC key, shared cheaply between requests.
#[derive(Clone)]
pub struct WebhookSecret(Arc<str>);

impl WebhookSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Arc::from(secret.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}

/// Verify the signature over `body`, then parse the metadata headers.
pub fn verify_request(
    secret: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Event, WebhookRejection> {
    let signature = headers
        .get(HEADER_HMAC_SHA256)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    verify_signature(secret, &body, signature)?;
    let metadata = Metadata::from_headers(headers)?;

    Ok(Event::new(metadata, body))
}

/// Router with the webhook endpoint mounted at [`DEFAULT_WEBHOOK_PATH`].
pub fn webhook_router(state: WebhookState) -> Router {
    webhook_route(DEFAULT_WEBHOOK_PATH, state)
}

/// Router with the webhook endpoint mounted at `path`.
pub fn webhook_route(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(receive_webhook))
        .with_state(state)
}

async fn receive_webhook(State(state): State<WebhookState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();

    let event = match state.verify.read_event(&parts.headers, body).await {
        Ok(event) => event,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected webhook");
            return state.verify.reject(rejection);
        }
    };

    let receipt = state.receiver.receive(event).await;
    debug!(?receipt, "Webhook acknowledged");

    StatusCode::OK.into_response()
}

/// Verify and parse the webhook, then pass the request on with the
/// [`Event`] in its extensions. The body is restored for downstream
/// handlers.
pub async fn verify_middleware(
    State(state): State<VerifyState>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    let event = match state.read_event(&parts.headers, body).await {
        Ok(event) => event,
        Err(rejection) => {
            warn!(error = %rejection, path = %parts.uri.path(), "Rejected webhook");
            return state.reject(rejection);
        }
    };

    let body = Body::from(event.body.clone());
    parts.extensions.insert(event);

    next.run(Request::from_parts(parts, body)).await
}
