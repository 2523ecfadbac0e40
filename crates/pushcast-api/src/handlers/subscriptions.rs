//! Registry inspection and reset.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use pushcast_core::EndpointSummary;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{error::Result, AppState};

/// Sample size when the caller gives none.
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// Largest sample served.
pub const MAX_SAMPLE_LIMIT: usize = 50;

/// Query parameters for the inspection route.
#[derive(Debug, Default, Deserialize)]
pub struct SampleQuery {
    /// Number of most recent endpoints to include.
    pub limit: Option<usize>,
}

/// Registry sample.
#[derive(Debug, Serialize)]
pub struct SubscriptionsResponse {
    /// Registered endpoints.
    pub total: usize,
    /// Redacted view of the most recent endpoints, oldest first.
    pub sample: Vec<EndpointSummary>,
}

/// Response from clearing the registry.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    /// Endpoints removed.
    pub cleared: usize,
}

/// Lists the total and a redacted sample of the most recent endpoints.
#[instrument(name = "list_subscriptions", skip_all)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    query: std::result::Result<Query<SampleQuery>, QueryRejection>,
) -> Result<Json<SubscriptionsResponse>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_SAMPLE_LIMIT).min(MAX_SAMPLE_LIMIT);

    let total = state.registry.count().await;
    let sample = state.registry.sample_tail(limit).await;

    Ok(Json(SubscriptionsResponse { total, sample }))
}

/// Removes every registered endpoint.
#[instrument(name = "clear_subscriptions", skip_all)]
pub async fn clear_subscriptions(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.registry.clear().await;
    info!(cleared, "cleared subscriptions");

    Json(ClearResponse { cleared })
}
