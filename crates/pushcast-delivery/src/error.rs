//! Error types for push delivery.
//!
//! A `DeliveryError` describes why a delivery attempt never produced a push
//! service response: payload encryption or VAPID signing failed, the
//! connection broke, or the request timed out. These travel inside
//! [`DeliveryOutcome::TransportError`](crate::outcome::DeliveryOutcome)
//! and never abort a broadcast. Only configuration errors surface as
//! `Err` when constructing a client.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Failures that prevent a push service from answering a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// RFC 8291 payload encryption failed.
    #[error("payload encryption failed: {message}")]
    Encryption {
        /// Encryption failure detail
        message: String,
    },

    /// VAPID signature could not be produced.
    #[error("vapid signing failed: {message}")]
    Vapid {
        /// Signing failure detail
        message: String,
    },

    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// Push service did not answer in time.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Configured request timeout
        timeout_seconds: u64,
    },

    /// Invalid client or sender configuration.
    #[error("invalid delivery configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Delivery task ended without reporting an outcome.
    #[error("delivery task aborted: {message}")]
    TaskAborted {
        /// Join failure detail
        message: String,
    },
}

impl DeliveryError {
    /// Creates an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption { message: message.into() }
    }

    /// Creates a VAPID signing error.
    pub fn vapid(message: impl Into<String>) -> Self {
        Self::Vapid { message: message.into() }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Creates a task aborted error.
    pub fn task_aborted(message: impl Into<String>) -> Self {
        Self::TaskAborted { message: message.into() }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Network failures and timeouts are retryable. Encryption, signing and
    /// configuration failures repeat identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Encryption { .. }
            | Self::Vapid { .. }
            | Self::Configuration { .. }
            | Self::TaskAborted { .. } => false,
        }
    }
}

/// Category of transport error for failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Encryption or signing problems.
    Crypto,
    /// Network connectivity and timeouts.
    Network,
    /// Configuration problems.
    Configuration,
    /// Internal task failures.
    Internal,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::Encryption { .. } | DeliveryError::Vapid { .. } => Self::Crypto,
            DeliveryError::Network { .. } | DeliveryError::Timeout { .. } => Self::Network,
            DeliveryError::Configuration { .. } => Self::Configuration,
            DeliveryError::TaskAborted { .. } => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto => write!(f, "crypto"),
            Self::Network => write!(f, "network"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_identified_correctly() {
        assert!(DeliveryError::network("connection refused").is_retryable());
        assert!(DeliveryError::timeout(30).is_retryable());

        assert!(!DeliveryError::encryption("bad p256dh").is_retryable());
        assert!(!DeliveryError::vapid("bad key").is_retryable());
        assert!(!DeliveryError::configuration("invalid subject").is_retryable());
        assert!(!DeliveryError::task_aborted("panicked").is_retryable());
    }

    #[test]
    fn error_categories_mapped_correctly() {
        assert_eq!(ErrorCategory::from(&DeliveryError::network("x")), ErrorCategory::Network);
        assert_eq!(ErrorCategory::from(&DeliveryError::timeout(5)), ErrorCategory::Network);
        assert_eq!(ErrorCategory::from(&DeliveryError::encryption("x")), ErrorCategory::Crypto);
        assert_eq!(ErrorCategory::from(&DeliveryError::vapid("x")), ErrorCategory::Crypto);
        assert_eq!(
            ErrorCategory::from(&DeliveryError::task_aborted("x")),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn error_display_format() {
        assert_eq!(DeliveryError::timeout(30).to_string(), "request timeout after 30s");
        assert_eq!(
            DeliveryError::encryption("invalid p256dh").to_string(),
            "payload encryption failed: invalid p256dh"
        );
        assert_eq!(ErrorCategory::Crypto.to_string(), "crypto");
    }
}
