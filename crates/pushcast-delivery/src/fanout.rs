//! Broadcast fanout with outcome-driven eviction.
//!
//! A broadcast snapshots the registry, delivers the payload to every
//! endpoint as an independent task, and folds outcomes into a
//! [`BroadcastReport`] in completion order. Endpoints whose push service
//! reports them permanently dead are evicted by their own delivery task as
//! soon as the outcome arrives, so eviction still happens if the caller
//! stops waiting for the report. Every other failure leaves the endpoint
//! registered.
//!
//! A broadcast never fails as a whole. A delivery task that panics is
//! reported as a transport failure for its endpoint.

use std::{sync::Arc, time::Instant};

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use pushcast_core::{Clock, Endpoint, EndpointRegistry, RealClock};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    error::DeliveryError,
    outcome::{DeliveryOutcome, FailureDescriptor},
    payload::NotificationPayload,
    retry::{RetryDecision, RetryPolicy},
    transport::PushTransport,
};

/// Fanout tuning knobs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FanoutConfig {
    /// Maximum deliveries in flight per broadcast, 0 for unbounded.
    pub max_concurrency: usize,
    /// Per-endpoint retry policy.
    pub retry: RetryPolicy,
}

/// Aggregate result of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Endpoints in the snapshot the broadcast started from.
    pub attempted: usize,
    /// Deliveries accepted by their push service.
    pub delivered: usize,
    /// Endpoints removed as permanently dead.
    pub evicted: usize,
    /// Non-fatal failures in completion order.
    pub failures: Vec<FailureDescriptor>,
}

impl BroadcastReport {
    fn record(&mut self, outcome: &DeliveryOutcome, failure: Option<FailureDescriptor>) {
        if outcome.is_delivered() {
            self.delivered += 1;
        } else if outcome.is_permanently_dead() {
            self.evicted += 1;
        } else if let Some(failure) = failure {
            self.failures.push(failure);
        }
    }
}

/// Delivers one payload to every registered endpoint.
#[derive(Clone)]
pub struct FanoutDispatcher {
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn PushTransport>,
    clock: Arc<dyn Clock>,
    config: FanoutConfig,
}

impl std::fmt::Debug for FanoutDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutDispatcher").field("config", &self.config).finish_non_exhaustive()
    }
}

impl FanoutDispatcher {
    /// Creates a dispatcher backed by the system clock.
    pub fn new(
        registry: Arc<EndpointRegistry>,
        transport: Arc<dyn PushTransport>,
        config: FanoutConfig,
    ) -> Self {
        Self { registry, transport, clock: Arc::new(RealClock::new()), config }
    }

    /// Replaces the clock used for retry backoff.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Broadcasts a notification to every registered endpoint.
    pub async fn broadcast(&self, payload: &NotificationPayload) -> BroadcastReport {
        self.broadcast_bytes(payload.to_bytes()).await
    }

    /// Broadcasts pre-encoded payload bytes.
    pub async fn broadcast_bytes(&self, payload: Bytes) -> BroadcastReport {
        let start_time = Instant::now();
        let endpoints = self.registry.snapshot().await;
        let mut report = BroadcastReport { attempted: endpoints.len(), ..Default::default() };

        if endpoints.is_empty() {
            debug!("broadcast skipped, no registered endpoints");
            return report;
        }

        info!(
            endpoints = report.attempted,
            max_concurrency = self.config.max_concurrency,
            "starting broadcast"
        );

        let max_concurrency = self.config.max_concurrency;
        let semaphore = (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency)));

        let mut pending: FuturesUnordered<_> = endpoints
            .into_iter()
            .map(|endpoint| {
                let identity = endpoint.identity().clone();
                let handle = tokio::spawn(deliver_endpoint(
                    endpoint,
                    payload.clone(),
                    Arc::clone(&self.registry),
                    Arc::clone(&self.transport),
                    Arc::clone(&self.clock),
                    self.config.retry.clone(),
                    semaphore.clone(),
                ));
                async move { (identity, handle.await) }
            })
            .collect();

        while let Some((identity, joined)) = pending.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                warn!(endpoint = %identity.preview(), error = %e, "delivery task failed");
                DeliveryOutcome::TransportError(DeliveryError::task_aborted(e.to_string()))
            });

            report.record(&outcome, outcome.failure(&identity));
        }

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            evicted = report.evicted,
            failed = report.failures.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "broadcast complete"
        );

        report
    }
}

async fn deliver_endpoint(
    endpoint: Endpoint,
    payload: Bytes,
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn PushTransport>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    semaphore: Option<Arc<Semaphore>>,
) -> DeliveryOutcome {
    // Never closed.
    let _permit = match semaphore {
        Some(semaphore) => semaphore.acquire_owned().await.ok(),
        None => None,
    };

    let mut attempt = 1;
    loop {
        let outcome = transport.deliver(&endpoint, &payload).await;

        match retry.decide(attempt, &outcome) {
            RetryDecision::Retry { delay } => {
                debug!(
                    endpoint = %endpoint.identity().preview(),
                    attempt,
                    delay_ms = delay.as_millis(),
                    "retrying delivery"
                );
                clock.sleep(delay).await;
                attempt += 1;
            },
            RetryDecision::GiveUp { .. } => {
                if outcome.is_permanently_dead() {
                    registry.remove(endpoint.identity()).await;
                    info!(endpoint = %endpoint.identity().preview(), "evicted dead endpoint");
                }
                return outcome;
            },
        }
    }
}
