//! HTTP error responses.
//!
//! Every error leaves the API as `{"error": {"code", "message"}}` with a
//! status matching its class.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pushcast_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for handler helpers.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was malformed or failed validation.
    #[error("{message}")]
    Validation {
        /// Machine-readable error code
        code: &'static str,
        /// Human-readable description
        message: String,
    },

    /// The request did not carry a valid shared secret.
    #[error("missing or invalid API secret")]
    Unauthorized,

    /// An unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

impl ApiError {
    /// Creates a validation error with the given code.
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { code, message: message.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } => code,
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidInput(message) => Self::validation("invalid_input", message),
            CoreError::RegistryInvariant(message) => Self::internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("invalid_json", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation("invalid_query", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetail { code: self.code().to_string(), message: self.to_string() },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_error_class() {
        assert_eq!(ApiError::validation("missing_field", "x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::internal("boom").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn core_validation_maps_to_bad_request() {
        let error = ApiError::from(CoreError::invalid_input("endpoint must not be empty"));

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), "invalid_input");
        assert_eq!(error.to_string(), "endpoint must not be empty");
    }

    #[test]
    fn response_carries_status() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
