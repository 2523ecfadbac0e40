//! VAPID key material (RFC 8292).
//!
//! The private key is the raw 32-byte P-256 scalar and the public key the
//! 65-byte uncompressed SEC1 point, both base64url without padding. That is
//! the form `VapidSignatureBuilder::from_base64` consumes and the form
//! browsers expect as `applicationServerKey`.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::{ecdsa::SigningKey, elliptic_curve::rand_core::OsRng};

use crate::error::{DeliveryError, Result};

/// VAPID keypair used to sign every push request.
#[derive(Clone, PartialEq, Eq)]
pub struct VapidKeys {
    private_key_b64: String,
    public_key_b64: String,
}

impl VapidKeys {
    /// Generates a fresh keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_bytes = signing_key.verifying_key().to_encoded_point(false);

        Self {
            private_key_b64: BASE64URL.encode(signing_key.to_bytes().as_slice()),
            public_key_b64: BASE64URL.encode(public_bytes.as_bytes()),
        }
    }

    /// Reconstructs a keypair from configured base64url strings.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if either key is not valid
    /// base64url, has the wrong length, or the private scalar is not a valid
    /// P-256 key.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self> {
        let public_bytes = BASE64URL.decode(public_key_b64.trim()).map_err(|e| {
            DeliveryError::configuration(format!("invalid base64url for VAPID public key: {e}"))
        })?;
        if public_bytes.len() != 65 || public_bytes[0] != 0x04 {
            return Err(DeliveryError::configuration(
                "VAPID public key must be a 65-byte uncompressed P-256 point",
            ));
        }

        let private_bytes = BASE64URL.decode(private_key_b64.trim()).map_err(|e| {
            DeliveryError::configuration(format!("invalid base64url for VAPID private key: {e}"))
        })?;
        if private_bytes.len() != 32 {
            return Err(DeliveryError::configuration(format!(
                "VAPID private key must be a 32-byte P-256 scalar, got {} bytes",
                private_bytes.len()
            )));
        }
        let signing_key = SigningKey::from_bytes(private_bytes.as_slice().into()).map_err(|_| {
            DeliveryError::configuration("VAPID private key is not a valid P-256 scalar")
        })?;

        let derived = signing_key.verifying_key().to_encoded_point(false);
        if derived.as_bytes() != public_bytes.as_slice() {
            return Err(DeliveryError::configuration(
                "VAPID public key does not match the private key",
            ));
        }

        Ok(Self {
            private_key_b64: private_key_b64.trim().to_string(),
            public_key_b64: public_key_b64.trim().to_string(),
        })
    }

    /// Base64url-encoded uncompressed public key.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    /// Base64url-encoded raw private scalar.
    pub fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }
}

impl fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key_b64)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
