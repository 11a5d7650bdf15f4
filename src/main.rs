use async_trait::async_trait;
use axum::{extract::State, response::Json, routing::get};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shopify_webhooks::config::{DedupConfig, WebhooksConfig};
use shopify_webhooks::gdpr::{
    register_gdpr, CustomerDataRequest, CustomerRedact, GdprHandler, ShopRedact,
};
use shopify_webhooks::handler::LogHandler;
use shopify_webhooks::http::{webhook_route, WebhookState};
use shopify_webhooks::payload::Order;
use shopify_webhooks::shutdown::ShutdownSignal;
use shopify_webhooks::{
    handler_fn, Event, HandlerError, IdempotencyStore, MemoryStore, Router, StoreError, Topic,
    WebhookReceiver, WorkerPool,
};

#[derive(Clone)]
struct AppState {
    router: Arc<Router>,
    pool: Option<Arc<WorkerPool>>,
    start_time: Instant,
}

/// Logs GDPR requests. Replace with real data export and erasure.
struct ComplianceLog;

#[async_trait]
impl GdprHandler for ComplianceLog {
    async fn customer_data_request(
        &self,
        event: &Event,
        request: CustomerDataRequest,
    ) -> Result<(), HandlerError> {
        info!(
            shop = %event.shop_domain(),
            customer_id = request.customer.id,
            data_request_id = request.data_request.id,
            orders = request.orders_requested.len(),
            "Customer data request"
        );
        Ok(())
    }

    async fn customer_redact(
        &self,
        event: &Event,
        request: CustomerRedact,
    ) -> Result<(), HandlerError> {
        info!(
            shop = %event.shop_domain(),
            customer_id = request.customer.id,
            orders = request.orders_to_redact.len(),
            "Customer redaction request"
        );
        Ok(())
    }

    async fn shop_redact(&self, event: &Event, request: ShopRedact) -> Result<(), HandlerError> {
        info!(
            shop = %event.shop_domain(),
            shop_id = request.shop_id,
            "Shop redaction request"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize Logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load Configuration
    let config = WebhooksConfig::load()?;

    // 3. Register Handlers
    let router = Arc::new(Router::new().with_error_observer(|event, error| {
        error!(
            topic = %event.topic(),
            event_id = %event.event_id(),
            shop = %event.shop_domain(),
            error = %error,
            "Webhook handler failed"
        );
    }));

    router.handle(
        Topic::ORDERS_CREATE,
        handler_fn(|event: Event| async move {
            let order: Order = event.decode()?;
            info!(
                shop = %event.shop_domain(),
                order = %order.name,
                total = %order.total_price,
                currency = %order.currency,
                "Order created"
            );
            Ok(())
        }),
    );
    register_gdpr(&router, Arc::new(ComplianceLog));
    router.fallback(LogHandler::with_prefix("unhandled"));

    // 4. Background Processing and Deduplication
    let mut receiver = WebhookReceiver::new(router.clone());

    let pool = match &config.pool {
        Some(settings) => {
            let pool = WorkerPool::with_observer(settings.to_pool_config(), |event, error| {
                warn!(
                    topic = %event.topic(),
                    event_id = %event.event_id(),
                    error = %error,
                    "Webhook not processed"
                );
            })?;
            Some(Arc::new(pool))
        }
        None => None,
    };

    if let Some(pool) = &pool {
        receiver = receiver.with_processor(pool.clone());
    }

    let mut memory_store = None;
    if let Some(dedup) = &config.dedup {
        let store: Arc<dyn IdempotencyStore> = match shared_store(dedup)? {
            Some(store) => {
                info!("Using Redis idempotency store");
                store
            }
            None => {
                let store = Arc::new(MemoryStore::new(dedup.ttl()));
                memory_store = Some(store.clone());
                store
            }
        };
        receiver = receiver.with_idempotency_store(store);
    }

    // 5. Build HTTP App
    let state = Arc::new(AppState {
        router: router.clone(),
        pool: pool.clone(),
        start_time: Instant::now(),
    });

    let app = webhook_route(
        &config.server.path,
        WebhookState::new(config.webhook.secret.clone(), receiver),
    )
    .merge(
        axum::Router::new()
            .route("/health", get(health_check))
            .with_state(state),
    );

    // 6. Start Server
    let shutdown = ShutdownSignal::new(config.shutdown.timeout());
    tokio::spawn(shutdown.clone().listen());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        path = %config.server.path,
        topics = router.handler_count(),
        "Webhook server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().triggered_owned())
        .await?;

    // 7. Drain
    if let Some(pool) = &pool {
        // Failures are logged by drain; exit normally either way.
        let _ = shutdown.drain(pool.as_ref()).await;
        let stats = pool.stats();
        info!(
            submitted = stats.submitted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            dropped = stats.dropped,
            "Worker pool stopped"
        );
    }

    if let Some(store) = memory_store {
        store.close().await;
    }

    info!("Shutdown complete");
    Ok(())
}

#[cfg(feature = "redis")]
fn shared_store(dedup: &DedupConfig) -> Result<Option<Arc<dyn IdempotencyStore>>, StoreError> {
    use shopify_webhooks::dedup::RedisStore;

    dedup
        .redis_url
        .as_deref()
        .map(|url| {
            RedisStore::from_url(url, dedup.ttl()).map(|store| Arc::new(store) as Arc<dyn IdempotencyStore>)
        })
        .transpose()
}

#[cfg(not(feature = "redis"))]
fn shared_store(_dedup: &DedupConfig) -> Result<Option<Arc<dyn IdempotencyStore>>, StoreError> {
    Ok(None)
}

/// Health endpoint - uptime, registered topics and pool counters
async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let pool = state.pool.as_ref().map(|pool| {
        let stats = pool.stats();
        json!({
            "closed": pool.is_closed(),
            "submitted": stats.submitted,
            "dropped": stats.dropped,
            "succeeded": stats.succeeded,
            "failed": stats.failed,
            "retried": stats.retried,
        })
    });

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "topics": state.router.handler_count(),
        "pool": pool,
    }))
}
