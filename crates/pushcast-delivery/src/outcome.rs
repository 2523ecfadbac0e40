//! Delivery outcomes and their eviction classification.
//!
//! The delivery client reduces every attempt to a [`DeliveryOutcome`]. The
//! dispatchers never look at raw status codes; they only branch on
//! [`RejectionClass`], so swapping the transport cannot change the eviction
//! policy.

use pushcast_core::EndpointIdentity;
use serde::Serialize;

use crate::error::{DeliveryError, ErrorCategory};

/// Eviction-relevant classification of a push service rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionClass {
    /// The subscription will never accept deliveries again (404, 410).
    PermanentlyDead,
    /// The request was refused for this sender or payload (400, 401, 403).
    ClientError,
    /// Anything else: throttling, oversize payloads, server failures.
    Transient,
}

impl RejectionClass {
    /// Classifies a push service status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 | 410 => Self::PermanentlyDead,
            400 | 401 | 403 => Self::ClientError,
            _ => Self::Transient,
        }
    }
}

/// A push service's refusal of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionReason {
    /// Status code returned by the push service.
    pub status: u16,
    /// Retry-After hint in seconds, when the service sent one.
    pub retry_after_seconds: Option<u64>,
}

impl RejectionReason {
    /// Creates a rejection for the given status code.
    pub fn new(status: u16) -> Self {
        Self { status, retry_after_seconds: None }
    }

    /// Attaches a Retry-After hint.
    #[must_use]
    pub fn with_retry_after(mut self, seconds: Option<u64>) -> Self {
        self.retry_after_seconds = seconds;
        self
    }

    /// Eviction class of this rejection.
    pub fn class(&self) -> RejectionClass {
        RejectionClass::from_status(self.status)
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The push service accepted the message.
    Delivered,
    /// The push service answered with a non-success status.
    Rejected(RejectionReason),
    /// No push service response was obtained.
    TransportError(DeliveryError),
}

impl DeliveryOutcome {
    /// Shorthand for a rejection with the given status.
    pub fn rejected(status: u16) -> Self {
        Self::Rejected(RejectionReason::new(status))
    }

    /// Whether the push service accepted the message.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Whether this outcome means the endpoint should be evicted.
    pub fn is_permanently_dead(&self) -> bool {
        matches!(self, Self::Rejected(reason) if reason.class() == RejectionClass::PermanentlyDead)
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// Only transient rejections and retryable transport errors qualify;
    /// dead endpoints and client errors fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Delivered => false,
            Self::Rejected(reason) => reason.class() == RejectionClass::Transient,
            Self::TransportError(error) => error.is_retryable(),
        }
    }

    /// Retry-After hint carried by a rejection.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::Rejected(reason) => reason.retry_after_seconds,
            _ => None,
        }
    }

    /// Failure descriptor for this outcome, `None` when delivered.
    pub fn failure(&self, identity: &EndpointIdentity) -> Option<FailureDescriptor> {
        match self {
            Self::Delivered => None,
            Self::Rejected(reason) => Some(FailureDescriptor::Rejected {
                endpoint: identity.preview(),
                status: reason.status,
                class: reason.class(),
            }),
            Self::TransportError(error) => Some(FailureDescriptor::Transport {
                endpoint: identity.preview(),
                category: ErrorCategory::from(error),
                message: error.to_string(),
            }),
        }
    }
}

/// Non-fatal failure entry in a broadcast report.
///
/// Identities are reduced to their preview form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDescriptor {
    /// The push service refused the delivery.
    Rejected {
        /// Truncated endpoint identity
        endpoint: String,
        /// Push service status code
        status: u16,
        /// Eviction classification
        class: RejectionClass,
    },
    /// No push service response was obtained.
    Transport {
        /// Truncated endpoint identity
        endpoint: String,
        /// Error category
        category: ErrorCategory,
        /// Error message
        message: String,
    },
}

impl FailureDescriptor {
    /// Status code for rejections.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }

    /// Truncated identity of the failing endpoint.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Rejected { endpoint, .. } | Self::Transport { endpoint, .. } => endpoint,
        }
    }
}
