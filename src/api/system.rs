//! System endpoints: health check and hub statistics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::HubError;
use crate::hub::HubStats;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /stats` — Hub registry snapshot.
///
/// # Errors
///
/// Returns [`HubError::Shutdown`] (503) once the dispatcher has stopped.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Hub statistics",
    description = "Returns a snapshot of connected peers and the active channel and service names.",
    responses(
        (status = 200, description = "Current routing snapshot"),
        (status = 503, description = "Hub is shutting down"),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<HubStats>, HubError> {
    Ok(Json(state.hub.stats().await?))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}
