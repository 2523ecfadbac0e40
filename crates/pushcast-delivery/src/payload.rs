//! Notification payload sent to every endpoint of a broadcast.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Click-through target used when a broadcast names none.
pub const DEFAULT_URL: &str = "/";

/// Visible notification content.
///
/// Serialized once per broadcast and shared by every delivery task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Click-through URL.
    pub url: String,
}

impl NotificationPayload {
    /// Creates a payload, falling back to [`DEFAULT_URL`] when `url` is
    /// missing or blank.
    pub fn new(title: impl Into<String>, body: impl Into<String>, url: Option<String>) -> Self {
        let url = url.filter(|u| !u.trim().is_empty()).unwrap_or_else(|| DEFAULT_URL.to_string());
        Self { title: title.into(), body: body.into(), url }
    }

    /// JSON encoding handed to the transport.
    pub fn to_bytes(&self) -> Bytes {
        // Serializing three owned strings cannot fail.
        Bytes::from(serde_json::to_vec(self).unwrap_or_default())
    }
}
