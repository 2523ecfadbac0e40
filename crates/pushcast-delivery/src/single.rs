//! Delivery to the most recently registered endpoint only.
//!
//! Used for low-noise "test my latest device" sends. The single-target path
//! never mutates the registry, even when the push service reports the
//! endpoint dead, and never retries.

use std::sync::Arc;

use pushcast_core::EndpointRegistry;
use tracing::{debug, info};

use crate::{
    outcome::FailureDescriptor, payload::NotificationPayload, transport::PushTransport,
};

/// Result of a single-target send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleDispatchResult {
    /// The registry was empty; nothing was attempted.
    NoSubscribers,
    /// The push service accepted the message.
    Delivered,
    /// The delivery failed; the endpoint was left registered.
    Failed(FailureDescriptor),
}

impl SingleDispatchResult {
    /// Number of successful deliveries, 0 or 1.
    pub fn sent(&self) -> usize {
        usize::from(matches!(self, Self::Delivered))
    }
}

/// Sends to the most recently registered endpoint.
#[derive(Clone)]
pub struct SingleTargetDispatcher {
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn PushTransport>,
}

impl std::fmt::Debug for SingleTargetDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleTargetDispatcher").finish_non_exhaustive()
    }
}

impl SingleTargetDispatcher {
    /// Creates a dispatcher over the shared registry.
    pub fn new(registry: Arc<EndpointRegistry>, transport: Arc<dyn PushTransport>) -> Self {
        Self { registry, transport }
    }

    /// Delivers `payload` to the most recently registered endpoint.
    pub async fn send_latest(&self, payload: &NotificationPayload) -> SingleDispatchResult {
        let Some(endpoint) = self.registry.most_recent().await else {
            debug!("single-target send skipped, no registered endpoints");
            return SingleDispatchResult::NoSubscribers;
        };

        let outcome = self.transport.deliver(&endpoint, &payload.to_bytes()).await;
        info!(
            endpoint = %endpoint.identity().preview(),
            delivered = outcome.is_delivered(),
            "single-target send complete"
        );

        match outcome.failure(endpoint.identity()) {
            None => SingleDispatchResult::Delivered,
            Some(failure) => SingleDispatchResult::Failed(failure),
        }
    }
}
