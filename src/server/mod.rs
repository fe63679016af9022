//! HTTP server for the auto-release bot.
//!
//! # Endpoints
//!
//! - `POST /webhook/github` - GitHub webhook deliveries; `pull_request` events
//!   run the pipeline before the response is sent
//! - `GET /health` - Returns 200 if the server is running
//! - `GET /metrics` - Prometheus text exposition of the bot's counters

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::github::InstallationClientCreator;
use crate::metrics::InMemoryMetrics;
use crate::pipeline::PullRequestHandler;
use crate::release_manager::ReleaseManagerApi;

pub mod health;
pub mod metrics;
pub mod webhook;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state, passed to handlers via axum's `State` extractor.
pub struct AppState<C, R> {
    inner: Arc<AppStateInner<C, R>>,
}

struct AppStateInner<C, R> {
    handler: PullRequestHandler<C, R>,

    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,

    metrics: Arc<InMemoryMetrics>,

    /// Cancelled on shutdown; each delivery runs under a child token.
    shutdown: CancellationToken,
}

impl<C, R> AppState<C, R> {
    pub fn new(
        handler: PullRequestHandler<C, R>,
        webhook_secret: impl Into<Vec<u8>>,
        metrics: Arc<InMemoryMetrics>,
        shutdown: CancellationToken,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                handler,
                webhook_secret: webhook_secret.into(),
                metrics,
                shutdown,
            }),
        }
    }

    pub fn handler(&self) -> &PullRequestHandler<C, R> {
        &self.inner.handler
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn metrics(&self) -> &InMemoryMetrics {
        &self.inner.metrics
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}

// Manual impl: cloning only bumps the Arc, so C and R need not be Clone.
impl<C, R> Clone for AppState<C, R> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<C, R>(app_state: AppState<C, R>) -> axum::Router
where
    C: InstallationClientCreator + 'static,
    R: ReleaseManagerApi + 'static,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook/github", post(webhook_handler::<C, R>))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler::<C, R>))
        .with_state(app_state)
}
