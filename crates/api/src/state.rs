use std::sync::Arc;

use filmnesia_events::{BestEffortPublisher, FailureCounter};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: filmnesia_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Publishes `UserRegistered` events without failing the request.
    pub notifier: BestEffortPublisher,
    /// Events dropped by `notifier`, surfaced on `/health`.
    pub publish_failures: Arc<FailureCounter>,
}
