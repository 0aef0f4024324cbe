use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// `UserRegistered` events dropped since startup.
    pub publish_failures: u64,
}

/// GET /health -- returns service and database health.
///
/// Dropped events do not degrade the status; they are reported so an
/// operator can alert on a growing count.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = filmnesia_db::health_check(&state.pool).await.is_ok();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        publish_failures: state.publish_failures.count(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
