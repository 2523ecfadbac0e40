//! Broadcast handlers.
//!
//! `/broadcast` fans out to every registered endpoint and, when configured,
//! relays the same notification to Pushover concurrently. `/broadcast/latest`
//! targets only the most recent registration.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use pushcast_delivery::{FailureDescriptor, NotificationPayload, SingleDispatchResult};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    error::{ApiError, Result},
    relay::RelayOutcome,
    AppState,
};

/// Notification content supplied by the caller.
#[derive(Debug, Default, Deserialize)]
pub struct BroadcastRequest {
    /// Notification title.
    pub title: Option<String>,
    /// Notification body.
    pub body: Option<String>,
    /// Click-through URL, `/` when omitted.
    pub url: Option<String>,
}

impl BroadcastRequest {
    fn into_payload(self) -> Result<NotificationPayload> {
        let title = required(self.title, "title")?;
        let body = required(self.body, "body")?;
        Ok(NotificationPayload::new(title, body, self.url))
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::validation("missing_field", format!("{field} is required")))
}

/// Outcome of a fanout broadcast.
#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    /// Endpoints the broadcast was attempted for.
    pub attempted: usize,
    /// Successful deliveries.
    pub sent: usize,
    /// Endpoints still registered afterwards.
    pub active: usize,
    /// Endpoints evicted as permanently dead.
    pub removed: usize,
    /// Non-fatal delivery failures.
    pub failures: Vec<FailureDescriptor>,
    /// Pushover relay result, when the relay is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayOutcome>,
}

/// Outcome of a single-target send.
#[derive(Debug, Serialize)]
pub struct LatestResponse {
    /// 1 if the latest endpoint accepted the message, 0 otherwise.
    pub sent: usize,
    /// Failure details when the delivery failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDescriptor>,
    /// Why nothing was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl From<SingleDispatchResult> for LatestResponse {
    fn from(result: SingleDispatchResult) -> Self {
        let sent = result.sent();
        match result {
            SingleDispatchResult::NoSubscribers => {
                Self { sent, failure: None, reason: Some("no_subscribers") }
            },
            SingleDispatchResult::Delivered => Self { sent, failure: None, reason: None },
            SingleDispatchResult::Failed(failure) => {
                Self { sent, failure: Some(failure), reason: None }
            },
        }
    }
}

/// Broadcasts a notification to every registered endpoint.
///
/// Always answers 200 once the request is valid, even when no delivery
/// succeeded; per-endpoint failures are listed in the response.
#[instrument(name = "broadcast", skip_all)]
pub async fn broadcast(
    State(state): State<AppState>,
    body: std::result::Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<BroadcastResponse>> {
    let Json(request) = body?;
    let payload = request.into_payload()?;

    let relay = async {
        match &state.relay {
            Some(relay) => Some(relay.send(&payload).await),
            None => None,
        }
    };
    let (report, relay) = tokio::join!(state.fanout.broadcast(&payload), relay);

    let active = state.registry.count().await;
    info!(
        sent = report.delivered,
        removed = report.evicted,
        failed = report.failures.len(),
        active,
        relay_ok = relay.as_ref().map(|r| r.ok),
        "broadcast handled"
    );

    Ok(Json(BroadcastResponse {
        attempted: report.attempted,
        sent: report.delivered,
        active,
        removed: report.evicted,
        failures: report.failures,
        relay,
    }))
}

/// Sends a notification to the most recently registered endpoint.
#[instrument(name = "broadcast_latest", skip_all)]
pub async fn broadcast_latest(
    State(state): State<AppState>,
    body: std::result::Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<LatestResponse>> {
    let Json(request) = body?;
    let payload = request.into_payload()?;

    let result = state.single.send_latest(&payload).await;
    Ok(Json(result.into()))
}
