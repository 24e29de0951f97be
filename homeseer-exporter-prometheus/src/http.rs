//! HTTP server for Prometheus metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::config::PollMode;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    bridge: Arc<Bridge>,
    mode: PollMode,
}

/// Create the HTTP router.
pub fn create_router(bridge: Arc<Bridge>, metrics_path: &str, mode: PollMode) -> Router {
    let state = AppState { bridge, mode };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
///
/// In on-demand mode every scrape runs one poll first. A failed poll
/// renders nothing; already published series stay as they were.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    if state.mode == PollMode::OnDemand {
        if let Err(e) = state.bridge.poll_once().await {
            warn!(error = %e, "On-demand poll failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response();
        }
    }

    (
        StatusCode::OK,
        [("content-type", CONTENT_TYPE)],
        state.bridge.registry().render(),
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    match state.bridge.stats().last_success {
        Some(_) => (StatusCode::OK, "ready\n").into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - no successful poll yet\n",
        )
            .into_response(),
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    bridge: Arc<Bridge>,
    listen_addr: SocketAddr,
    metrics_path: String,
    mode: PollMode,
}

impl HttpServer {
    pub fn new(
        bridge: Arc<Bridge>,
        listen_addr: SocketAddr,
        metrics_path: String,
        mode: PollMode,
    ) -> Self {
        Self {
            bridge,
            listen_addr,
            metrics_path,
            mode,
        }
    }

    /// Bind the listener, then serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr().unwrap_or(self.listen_addr);
        let router = create_router(self.bridge, &self.metrics_path, self.mode);

        info!(
            addr = %addr,
            path = %self.metrics_path,
            mode = ?self.mode,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
