//! # Shopify Webhooks
//!
//! Receive Shopify webhooks: verify them, route each event to exactly one
//! handler, and optionally process events in the background with bounded
//! concurrency, retries and duplicate suppression.
//!
//! ## Architecture
//!
//! ```text
//! HTTP -> verify -> Metadata -> WebhookReceiver -> dedup? -> WorkerPool? -> Router -> Handler
//! ```
//!
//! ## Modules
//!
//! - [`topic`], [`event`]: routing keys and the verified event
//! - [`router`], [`handler`]: topic to handler dispatch
//! - [`pool`]: bounded background processing with retry and graceful drain
//! - [`dedup`]: idempotency stores keyed by event id
//! - [`receiver`]: ties dedup, pool and router together
//! - [`verify`], [`http`]: signature checks and the axum adapter
//! - [`gdpr`], [`payload`]: mandatory compliance topics and payload shapes
//! - [`admin`]: subscription management over the Admin API
//! - [`config`], [`shutdown`]: server configuration and lifecycle
//! - [`testutil`]: signed requests for handler tests

pub mod admin;
pub mod config;
pub mod dedup;
pub mod event;
pub mod gdpr;
pub mod handler;
pub mod http;
pub mod payload;
pub mod pool;
pub mod receiver;
pub mod router;
pub mod shutdown;
pub mod testutil;
pub mod topic;
pub mod verify;

// Re-export commonly used types at crate root
pub use dedup::{IdempotencyStore, MemoryStore, StoreError};
pub use event::{Event, Metadata, MetadataError};
pub use handler::{handler_fn, Handler, HandlerError};
pub use pool::{AsyncProcessor, PoolConfig, ShutdownError, WorkerPool};
pub use receiver::{Receipt, WebhookReceiver};
pub use router::{DispatchError, ErrorObserver, Router, RouterError};
pub use topic::Topic;
pub use verify::{verify_signature, VerifyError};
