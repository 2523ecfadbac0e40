//! Shared-secret authorization for broadcast and inspection routes.
//!
//! The secret is read from `Authorization: Bearer <secret>` or
//! `X-Api-Secret: <secret>` and compared by SHA-256 digest. When no secret
//! is configured the middleware lets every request through.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{error::ApiError, AppState};

/// Header carrying the secret as an alternative to `Authorization`.
pub const SECRET_HEADER: &str = "x-api-secret";

/// Digest of the configured shared secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSecret {
    digest: [u8; 32],
}

impl ApiSecret {
    /// Hashes the configured secret.
    pub fn new(secret: &str) -> Self {
        Self { digest: Sha256::digest(secret.as_bytes()).into() }
    }

    /// Whether `candidate` hashes to the configured secret.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        candidate == self.digest
    }
}

impl std::fmt::Debug for ApiSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiSecret(***)")
    }
}

/// Extracts the presented secret from request headers.
///
/// Supports Bearer token format and the `X-Api-Secret` header.
fn extract_secret(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .or_else(|| headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok()))
        .map(str::trim)
}

/// Axum middleware that rejects requests without the shared secret.
pub async fn require_secret(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(secret) = &state.api_secret {
        let presented = extract_secret(req.headers());
        if !presented.is_some_and(|candidate| secret.matches(candidate)) {
            warn!(path = %req.uri().path(), "rejected request without valid API secret");
            return Err(ApiError::Unauthorized);
        }
    }

    Ok(next.run(req).await)
}
