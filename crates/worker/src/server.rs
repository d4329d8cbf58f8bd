//! HTTP server exposing `/metrics` and `/health`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::metrics::{TranscodeMetrics, PROMETHEUS_CONTENT_TYPE};

/// Shared state for the metrics server handlers.
#[derive(Clone)]
pub struct ServerState {
    pub metrics: Arc<TranscodeMetrics>,
    pub pool: transcoder_db::DbPool,
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the skip-tracker database is reachable.
    pub db_healthy: bool,
    /// Current worker state (`idle` / `processing`).
    pub state: &'static str,
}

/// GET /metrics -- Prometheus text exposition.
async fn metrics_handler(State(state): State<ServerState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.prometheus_exposition(),
    )
}

/// GET /health -- returns worker and database health.
async fn health_check(State(state): State<ServerState>) -> Json<HealthResponse> {
    let db_healthy = transcoder_db::health_check(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        state: state.metrics.state().as_str(),
    })
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `0.0.0.0:<port>` and serve until `cancel` fires.
///
/// Binding happens before this returns so startup fails fast on a taken
/// port; serving continues on a spawned task.
pub async fn spawn(
    port: u16,
    state: ServerState,
    cancel: CancellationToken,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Metrics server listening");

    let app = router(state);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            tracing::error!(error = %e, "Metrics server error");
        }
    }))
}
