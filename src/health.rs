//! Keep-alive HTTP endpoint for hosts that expect the process to serve HTTP.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::config::ConfigStatus;
use crate::registration::SessionStore;

/// Shared state for the health routes.
#[derive(Clone)]
pub struct HealthState {
    pub config: ConfigStatus,
    pub sessions: Arc<SessionStore>,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub config: ConfigStatus,
    pub active_sessions: usize,
}

/// GET /
async fn root() -> &'static str {
    "ok"
}

/// GET /health
async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    Json(HealthReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        config: state.config.clone(),
        active_sessions: state.sessions.active_count().await,
    })
}

/// Build the keep-alive routes.
pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve the health routes on `0.0.0.0:port` in a background task.
pub async fn spawn_server(
    port: u16,
    state: HealthState,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    let app = health_routes(state);
    tracing::info!(port, "Health endpoint listening");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Health endpoint stopped");
        }
    }))
}
