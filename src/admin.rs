//! Admin API client for webhook subscriptions.
//!
//! Creates, lists, updates and deletes subscriptions through the REST Admin
//! API (`https://{shop}/admin/api/{version}/webhooks.json`).
//!
//! ```rust,ignore
//! use shopify_webhooks::admin::{AdminClient, WebhookInput};
//!
//! let client = AdminClient::new("mystore.myshopify.com", "shpat_xxx");
//! let webhook = client
//!     .create(&WebhookInput::new("orders/create", "https://example.com/webhooks"))
//!     .await?;
//! ```

use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// API version used unless overridden with [`AdminClient::with_api_version`].
pub const DEFAULT_API_VERSION: &str = "2025-01";

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Admin API errors.
#[derive(Error, Debug)]
pub enum AdminError {
    /// Non-2xx response
    #[error("shopify API error (status {status}): {body}")]
    Api { status: StatusCode, body: String },

    /// Transport failure or undecodable response body
    #[error("admin request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl AdminError {
    /// Status code of an API error response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
        }
    }
}

/// A webhook subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Webhook {
    pub id: i64,
    pub address: String,
    pub topic: String,
    pub format: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metafield_namespaces: Vec<String>,
    pub api_version: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of create and update calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookInput {
    pub address: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metafield_namespaces: Vec<String>,
}

impl WebhookInput {
    pub fn new(topic: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }
}

/// Filters for [`AdminClient::list`]. Empty and zero values are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub topic: String,
    pub address: String,
    pub limit: u32,
    pub since_id: i64,
}

impl ListOptions {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = filter_query(&self.topic, &self.address);
        if self.limit > 0 {
            query.push(("limit", self.limit.to_string()));
        }
        if self.since_id > 0 {
            query.push(("since_id", self.since_id.to_string()));
        }
        query
    }
}

/// Filters for [`AdminClient::count`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountOptions {
    pub topic: String,
    pub address: String,
}

impl CountOptions {
    fn query(&self) -> Vec<(&'static str, String)> {
        filter_query(&self.topic, &self.address)
    }
}

fn filter_query(topic: &str, address: &str) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if !topic.is_empty() {
        query.push(("topic", topic.to_string()));
    }
    if !address.is_empty() {
        query.push(("address", address.to_string()));
    }
    query
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    webhook: Webhook,
}

#[derive(Serialize)]
struct WebhookInputEnvelope<'a> {
    webhook: &'a WebhookInput,
}

#[derive(Deserialize)]
struct WebhooksEnvelope {
    #[serde(default)]
    webhooks: Vec<Webhook>,
}

#[derive(Deserialize)]
struct CountEnvelope {
    count: u64,
}

/// REST Admin API client scoped to one shop.
#[derive(Debug, Clone)]
pub struct AdminClient {
    shop_domain: String,
    access_token: String,
    api_version: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl AdminClient {
    pub fn new(shop_domain: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            shop_domain: shop_domain.into(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Send requests to `base_url` instead of `https://{shop}/admin/api/{version}`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!(
                "https://{}/admin/api/{}",
                self.shop_domain, self.api_version
            ),
        }
    }

    /// Register a new subscription.
    pub async fn create(&self, input: &WebhookInput) -> Result<Webhook, AdminError> {
        let envelope: WebhookEnvelope = self
            .send(
                self.request(Method::POST, "/webhooks.json")
                    .json(&WebhookInputEnvelope { webhook: input }),
            )
            .await?;
        Ok(envelope.webhook)
    }

    pub async fn list(&self, options: Option<&ListOptions>) -> Result<Vec<Webhook>, AdminError> {
        let mut request = self.request(Method::GET, "/webhooks.json");
        if let Some(options) = options {
            request = request.query(&options.query());
        }
        let envelope: WebhooksEnvelope = self.send(request).await?;
        Ok(envelope.webhooks)
    }

    pub async fn get(&self, id: i64) -> Result<Webhook, AdminError> {
        let envelope: WebhookEnvelope = self
            .send(self.request(Method::GET, &format!("/webhooks/{id}.json")))
            .await?;
        Ok(envelope.webhook)
    }

    pub async fn update(&self, id: i64, input: &WebhookInput) -> Result<Webhook, AdminError> {
        let envelope: WebhookEnvelope = self
            .send(
                self.request(Method::PUT, &format!("/webhooks/{id}.json"))
                    .json(&WebhookInputEnvelope { webhook: input }),
            )
            .await?;
        Ok(envelope.webhook)
    }

    pub async fn delete(&self, id: i64) -> Result<(), AdminError> {
        let response = self
            .request(Method::DELETE, &format!("/webhooks/{id}.json"))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn count(&self, options: Option<&CountOptions>) -> Result<u64, AdminError> {
        let mut request = self.request(Method::GET, "/webhooks/count.json");
        if let Some(options) = options {
            request = request.query(&options.query());
        }
        let envelope: CountEnvelope = self.send(request).await?;
        Ok(envelope.count)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url(), path);
        debug!(method = %method, url = %url, "Admin API request");

        self.http
            .request(method, url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AdminError> {
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AdminError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Admin API error response");
    Err(AdminError::Api { status, body })
}
