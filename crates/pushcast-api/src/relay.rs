//! Pushover relay.
//!
//! Forwards each broadcast to a Pushover account alongside the web push
//! fanout. The relay is an independent sink: its result is reported next to
//! the broadcast report and never changes it.

use std::time::Duration;

use pushcast_delivery::NotificationPayload;
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Pushover messages API.
pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Credentials and target for the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Application token.
    pub token: String,
    /// User or group key.
    pub user: String,
    /// Messages API URL.
    pub api_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl RelayConfig {
    /// Creates a relay configuration against the public Pushover API.
    pub fn new(token: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user: user.into(),
            api_url: PUSHOVER_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Result of one relay attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayOutcome {
    /// Whether Pushover accepted the message.
    pub ok: bool,
    /// Failure description when not accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayOutcome {
    fn success() -> Self {
        Self { ok: true, error: None }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, error: Some(error.into()) }
    }
}

/// Pushover API client.
#[derive(Debug, Clone)]
pub struct PushoverRelay {
    client: reqwest::Client,
    config: RelayConfig,
}

impl PushoverRelay {
    /// Creates a relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RelayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Sends a notification to Pushover.
    #[instrument(name = "pushover_relay", skip_all)]
    pub async fn send(&self, payload: &NotificationPayload) -> RelayOutcome {
        let form = [
            ("token", self.config.token.as_str()),
            ("user", self.config.user.as_str()),
            ("title", payload.title.as_str()),
            ("message", payload.body.as_str()),
            ("url", payload.url.as_str()),
        ];

        let response = match self.client.post(&self.config.api_url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "pushover request failed");
                return RelayOutcome::failure(e.to_string());
            },
        };

        let status = response.status();
        if status.is_success() {
            debug!("pushover accepted message");
            return RelayOutcome::success();
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), %body, "pushover rejected message");
        RelayOutcome::failure(format!("pushover returned {}: {body}", status.as_u16()))
    }
}
