//! Browser subscription registration.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use pushcast_core::Endpoint;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    error::{ApiError, Result},
    AppState,
};

/// Browser `PushSubscription.toJSON()` body.
///
/// Fields are optional so that missing values produce a structured 400
/// rather than a deserialization rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    /// Push service URL.
    pub endpoint: Option<String>,
    /// Encryption keys.
    pub keys: Option<SubscriptionKeys>,
}

/// Client encryption keys of a subscription.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionKeys {
    /// Client P-256 ECDH public key.
    pub p256dh: Option<String>,
    /// Client auth secret.
    pub auth: Option<String>,
}

/// Response from a successful registration.
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    /// Always `true`.
    pub ok: bool,
    /// Registered endpoints after this registration.
    pub total: usize,
}

impl SubscribeRequest {
    fn into_endpoint(self) -> Result<Endpoint> {
        let endpoint = self
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ApiError::validation("missing_endpoint", "endpoint is required"))?;

        let keys = self.keys.unwrap_or_default();
        let (Some(p256dh), Some(auth)) = (keys.p256dh, keys.auth) else {
            return Err(ApiError::validation(
                "missing_keys",
                "keys.p256dh and keys.auth are required",
            ));
        };

        Ok(Endpoint::from_parts(endpoint, p256dh, auth)?)
    }
}

/// Registers a browser push subscription.
///
/// Re-registering a known endpoint refreshes its keys without changing the
/// total.
#[instrument(name = "subscribe", skip_all)]
pub async fn subscribe(
    State(state): State<AppState>,
    body: std::result::Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubscribeResponse>)> {
    let Json(request) = body?;
    let endpoint = request.into_endpoint()?;
    let preview = endpoint.identity().preview();

    let total = state.registry.add(endpoint).await;
    info!(endpoint = %preview, total, "registered subscription");

    Ok((StatusCode::CREATED, Json(SubscribeResponse { ok: true, total })))
}
