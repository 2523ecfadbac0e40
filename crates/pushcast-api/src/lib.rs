//! Pushcast HTTP API.
//!
//! Exposes subscription registration, broadcast, and registry inspection
//! over axum, plus the configuration layer and the optional Pushover relay.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use pushcast_core::{Clock, EndpointRegistry, RealClock};
use pushcast_delivery::{FanoutConfig, FanoutDispatcher, PushTransport, SingleTargetDispatcher};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod relay;
pub mod server;

pub use config::Config;
pub use error::{ApiError, Result};
pub use middleware::auth::ApiSecret;
pub use relay::{PushoverRelay, RelayConfig, RelayOutcome};
pub use server::{create_router, start_server};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Live endpoint registry.
    pub registry: Arc<EndpointRegistry>,
    /// Broadcast dispatcher.
    pub fanout: FanoutDispatcher,
    /// Most-recent-endpoint dispatcher.
    pub single: SingleTargetDispatcher,
    /// Pushover relay, when configured.
    pub relay: Option<PushoverRelay>,
    /// Shared secret guarding broadcast and inspection routes.
    pub api_secret: Option<ApiSecret>,
    /// VAPID public key served to browsers.
    pub vapid_public_key: Arc<str>,
    /// Clock for response timestamps.
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("fanout", &self.fanout)
            .field("relay", &self.relay.is_some())
            .field("api_secret", &self.api_secret)
            .field("vapid_public_key", &self.vapid_public_key)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wires both dispatchers to the same registry and transport.
    pub fn new(
        registry: Arc<EndpointRegistry>,
        transport: Arc<dyn PushTransport>,
        fanout_config: FanoutConfig,
        vapid_public_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            fanout: FanoutDispatcher::new(registry.clone(), transport.clone(), fanout_config),
            single: SingleTargetDispatcher::new(registry.clone(), transport),
            registry,
            relay: None,
            api_secret: None,
            vapid_public_key: vapid_public_key.into(),
            clock: Arc::new(RealClock::new()),
        }
    }

    /// Enables the Pushover relay for broadcasts.
    #[must_use]
    pub fn with_relay(mut self, relay: PushoverRelay) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Requires the shared secret on protected routes.
    #[must_use]
    pub fn with_api_secret(mut self, secret: &str) -> Self {
        self.api_secret = Some(ApiSecret::new(secret));
        self
    }

    /// Replaces the clock for retry backoff and response timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.fanout = self.fanout.with_clock(clock.clone());
        self.clock = clock;
        self
    }
}
