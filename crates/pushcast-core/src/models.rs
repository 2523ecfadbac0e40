//! Endpoint model and redacted summaries.
//!
//! An [`Endpoint`] is one browser push subscription: the push service URL
//! that identifies it and the key material the browser handed out for
//! payload encryption. Both are validated once, at the boundary, and are
//! immutable afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of characters of an identity shown in previews and logs.
pub const IDENTITY_PREVIEW_CHARS: usize = 40;

/// Unique, non-empty delivery address of a push subscription.
///
/// For web push this is the push service URL the browser returned from
/// `PushManager.subscribe()`. It is treated as opaque: only emptiness is
/// checked.
///
/// # Example
///
/// ```
/// use pushcast_core::EndpointIdentity;
///
/// let identity = EndpointIdentity::new("https://push.example.com/abc").unwrap();
/// assert_eq!(identity.as_str(), "https://push.example.com/abc");
/// assert!(EndpointIdentity::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointIdentity(String);

impl EndpointIdentity {
    /// Creates an identity, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CoreError::invalid_input("endpoint identity must not be empty"));
        }
        Ok(Self(value))
    }

    /// Returns the raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a truncated form safe for logs and inspection output.
    pub fn preview(&self) -> String {
        if self.0.chars().count() <= IDENTITY_PREVIEW_CHARS {
            return self.0.clone();
        }
        let head: String = self.0.chars().take(IDENTITY_PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EndpointIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EndpointIdentity {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<EndpointIdentity> for String {
    fn from(identity: EndpointIdentity) -> Self {
        identity.0
    }
}

/// Key material a browser supplies with its push subscription.
///
/// `p256dh` is the browser's P-256 ECDH public key and `auth` the shared
/// authentication secret, both base64url encoded. The registry never
/// interprets them; the delivery client hands them to the encryption layer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMaterial {
    /// Browser P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared authentication secret (base64url).
    pub auth: String,
}

impl CredentialMaterial {
    /// Creates credential material, rejecting empty keys.
    pub fn new(p256dh: impl Into<String>, auth: impl Into<String>) -> Result<Self> {
        let p256dh = p256dh.into();
        let auth = auth.into();
        if p256dh.trim().is_empty() {
            return Err(CoreError::invalid_input("p256dh key must not be empty"));
        }
        if auth.trim().is_empty() {
            return Err(CoreError::invalid_input("auth secret must not be empty"));
        }
        Ok(Self { p256dh, auth })
    }
}

// Key bytes never reach logs.
impl fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialMaterial")
            .field("p256dh_len", &self.p256dh.len())
            .field("auth_len", &self.auth.len())
            .finish()
    }
}

/// One subscriber's push delivery destination and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    identity: EndpointIdentity,
    credentials: CredentialMaterial,
}

impl Endpoint {
    /// Creates an endpoint from validated parts.
    pub fn new(identity: EndpointIdentity, credentials: CredentialMaterial) -> Self {
        Self { identity, credentials }
    }

    /// Validates raw subscription fields into an endpoint.
    pub fn from_parts(
        identity: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::new(EndpointIdentity::new(identity)?, CredentialMaterial::new(p256dh, auth)?))
    }

    /// Delivery address of this endpoint.
    pub fn identity(&self) -> &EndpointIdentity {
        &self.identity
    }

    /// Encryption key material of this endpoint.
    pub fn credentials(&self) -> &CredentialMaterial {
        &self.credentials
    }

    /// Redacted view for inspection output.
    pub fn summary(&self) -> EndpointSummary {
        EndpointSummary {
            identity_preview: self.identity.preview(),
            p256dh_len: self.credentials.p256dh.len(),
            auth_len: self.credentials.auth.len(),
        }
    }
}

/// Redacted endpoint description.
///
/// Carries a truncated identity and the lengths of the key material, never
/// the key bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    /// Truncated delivery address.
    pub identity_preview: String,
    /// Length of the p256dh key string.
    pub p256dh_len: usize,
    /// Length of the auth secret string.
    pub auth_len: usize,
}
