//! Health check handlers for service monitoring.
//!
//! The registry lives in memory, so health reduces to reporting the
//! subscriber count; there is no external dependency to probe.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Registered push endpoints
    pub subscribers: usize,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
}

/// Health check endpoint handler.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let subscribers = state.registry.count().await;
    debug!(subscribers, "health check completed");

    let response = HealthResponse {
        status: HealthStatus::Healthy,
        subscribers,
        timestamp: DateTime::<Utc>::from(state.clock.now_system()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// Liveness check endpoint for orchestration probes.
///
/// Does not touch the registry.
#[instrument(name = "liveness_check", skip(state))]
pub async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": DateTime::<Utc>::from(state.clock.now_system()),
        "service": "pushcast-api"
    });

    (StatusCode::OK, Json(response))
}

/// Serves the VAPID public key browsers pass as `applicationServerKey`.
#[instrument(name = "vapid_public_key", skip(state))]
pub async fn vapid_public_key(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "public_key": state.vapid_public_key.as_ref() }))
}
