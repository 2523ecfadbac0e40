//! Error types for registry and validation operations.
//!
//! Validation failures are recovered at the API boundary and never reach
//! the registry. Invariant violations indicate a programming defect in the
//! registry itself and are not runtime-recoverable.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for endpoint validation and registry checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Input failed validation before entering the registry.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Identity index and ordered slots disagree.
    #[error("registry invariant violated: {0}")]
    RegistryInvariant(String),
}

impl CoreError {
    /// Creates a validation error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a registry invariant error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::RegistryInvariant(message.into())
    }

    /// Returns true when the error was caused by caller input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
