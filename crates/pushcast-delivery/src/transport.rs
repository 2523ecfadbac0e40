//! Push delivery transport.
//!
//! [`PushTransport`] performs exactly one delivery attempt and reduces the
//! result to a [`DeliveryOutcome`]. [`WebPushClient`] is the production
//! implementation: RFC 8291 payload encryption and RFC 8292 VAPID signing
//! through the `web-push` crate, sent over a pooled `reqwest` client.
//! `mock::MockTransport`, built with the `test-util` feature, returns
//! scripted outcomes for dispatcher tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use pushcast_core::Endpoint;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessage,
    WebPushMessageBuilder,
};

use crate::{
    error::{DeliveryError, Result},
    outcome::{DeliveryOutcome, RejectionReason},
    vapid::VapidKeys,
};

/// Retry-After value assumed when the header is present but unparseable.
const DEFAULT_RETRY_AFTER_SECONDS: u64 = 60;

/// One delivery attempt to one endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Delivers `payload` to `endpoint`.
    ///
    /// Never fails: every failure mode is expressed as an outcome.
    async fn deliver(&self, endpoint: &Endpoint, payload: &Bytes) -> DeliveryOutcome;
}

/// HTTP settings for the push client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for a single push request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: format!("pushcast/{}", env!("CARGO_PKG_VERSION")),
            verify_tls: true,
        }
    }
}

/// Push message urgency (RFC 8030 §5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    /// Deliver only when the device is on power and wifi.
    VeryLow,
    /// Deliver on power or wifi.
    Low,
    /// Deliver when the device is not in a low-power state.
    Normal,
    /// Deliver immediately.
    High,
}

impl Urgency {
    /// Header value for this urgency.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// Sender identity attached to every push message.
#[derive(Debug, Clone)]
pub struct WebPushConfig {
    /// VAPID keypair used for signing.
    pub vapid: VapidKeys,
    /// VAPID `sub` claim: a `mailto:` or `https:` contact URI.
    pub subject: String,
    /// How long the push service should hold an undelivered message.
    pub ttl_seconds: u32,
    /// Urgency header, omitted when `None`.
    pub urgency: Option<Urgency>,
}

impl WebPushConfig {
    /// Creates a sender identity with a one day TTL.
    pub fn new(vapid: VapidKeys, subject: impl Into<String>) -> Self {
        Self { vapid, subject: subject.into(), ttl_seconds: 86_400, urgency: None }
    }

    /// Validates the contact claim.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the subject is not a
    /// `mailto:` or `https:` URI.
    pub fn validate(&self) -> Result<()> {
        if !(self.subject.starts_with("mailto:") || self.subject.starts_with("https:")) {
            return Err(DeliveryError::configuration(format!(
                "VAPID subject must be a mailto: or https: URI, got '{}'",
                self.subject
            )));
        }
        Ok(())
    }
}

/// Web Push delivery client.
#[derive(Debug, Clone)]
pub struct WebPushClient {
    client: reqwest::Client,
    config: ClientConfig,
    sender: WebPushConfig,
}

impl WebPushClient {
    /// Creates a client for the given sender identity.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built or the sender identity is invalid.
    pub fn new(config: ClientConfig, sender: WebPushConfig) -> Result<Self> {
        sender.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config, sender })
    }

    /// Public half of the signing keypair.
    pub fn vapid_public_key(&self) -> &str {
        self.sender.vapid.public_key_base64url()
    }

    fn build_message(&self, endpoint: &Endpoint, payload: &[u8]) -> Result<WebPushMessage> {
        let credentials = endpoint.credentials();
        let subscription = SubscriptionInfo::new(
            endpoint.identity().as_str(),
            &credentials.p256dh,
            &credentials.auth,
        );

        let private_key = self.sender.vapid.private_key_base64url();
        let mut signature_builder = VapidSignatureBuilder::from_base64(private_key, &subscription)
            .map_err(|e| DeliveryError::vapid(e.to_string()))?;
        signature_builder.add_claim("sub", self.sender.subject.as_str());
        let signature = signature_builder.build().map_err(|e| DeliveryError::vapid(e.to_string()))?;

        let mut builder = WebPushMessageBuilder::new(&subscription);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(self.sender.ttl_seconds);

        builder.build().map_err(|e| DeliveryError::encryption(e.to_string()))
    }

    async fn send(&self, message: WebPushMessage) -> DeliveryOutcome {
        let start_time = Instant::now();

        let mut request =
            self.client.post(message.endpoint.to_string()).header("TTL", message.ttl.to_string());

        if let Some(urgency) = self.sender.urgency {
            request = request.header("Urgency", urgency.as_str());
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(duration_ms = start_time.elapsed().as_millis(), "push request failed: {e}");
                if e.is_timeout() {
                    return DeliveryOutcome::TransportError(DeliveryError::timeout(
                        self.config.timeout.as_secs(),
                    ));
                }
                return DeliveryOutcome::TransportError(DeliveryError::network(e.to_string()));
            },
        };

        let status = response.status();
        let duration_ms = start_time.elapsed().as_millis();

        if status.is_success() {
            debug!(status = status.as_u16(), duration_ms, "push accepted");
            return DeliveryOutcome::Delivered;
        }

        let retry_after = extract_retry_after_seconds(response.headers());
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), duration_ms, body = %truncate(&body, 256), "push rejected");

        DeliveryOutcome::Rejected(RejectionReason::new(status.as_u16()).with_retry_after(retry_after))
    }
}

#[async_trait]
impl PushTransport for WebPushClient {
    async fn deliver(&self, endpoint: &Endpoint, payload: &Bytes) -> DeliveryOutcome {
        let span = info_span!(
            "push_delivery",
            delivery_id = %Uuid::new_v4(),
            endpoint = %endpoint.identity().preview(),
        );

        async move {
            let message = match self.build_message(endpoint, payload) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "failed to prepare push message");
                    return DeliveryOutcome::TransportError(e);
                },
            };

            self.send(message).await
        }
        .instrument(span)
        .await
    }
}

/// Extracts a Retry-After delay in seconds.
///
/// Supports both delta-seconds and HTTP-date. Falls back to 60 seconds when
/// the header is present but unparseable; `None` when absent.
pub fn extract_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    let retry_after = headers.get(reqwest::header::RETRY_AFTER)?;
    let Ok(value) = retry_after.to_str() else {
        return Some(DEFAULT_RETRY_AFTER_SECONDS);
    };

    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(seconds);
    }

    if let Ok(date_time) = chrono::DateTime::parse_from_rfc2822(value) {
        let now = chrono::Utc::now();
        let retry_time = date_time.with_timezone(&chrono::Utc);
        return Some(retry_time.signed_duration_since(now).to_std().map_or(0, |d| d.as_secs()));
    }

    Some(DEFAULT_RETRY_AFTER_SECONDS)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Scripted transport for dispatcher tests.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::{
        collections::{HashMap, HashSet, VecDeque},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use bytes::Bytes;
    use pushcast_core::Endpoint;
    use tokio::sync::RwLock;

    use super::PushTransport;
    use crate::outcome::DeliveryOutcome;

    /// Transport returning preconfigured outcomes per endpoint identity.
    ///
    /// A scripted sequence is consumed one outcome per call; its last entry
    /// repeats once the rest is used up. Unscripted identities receive the
    /// default outcome, `Delivered` unless changed. Clones share state.
    #[derive(Debug, Clone)]
    pub struct MockTransport {
        scripts: Arc<RwLock<HashMap<String, VecDeque<DeliveryOutcome>>>>,
        default_outcome: Arc<RwLock<DeliveryOutcome>>,
        panics: Arc<RwLock<HashSet<String>>>,
        calls: Arc<RwLock<Vec<(String, Bytes)>>>,
        delay: Option<Duration>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockTransport {
        /// Creates a transport that delivers everything.
        pub fn new() -> Self {
            Self {
                scripts: Arc::new(RwLock::new(HashMap::new())),
                default_outcome: Arc::new(RwLock::new(DeliveryOutcome::Delivered)),
                panics: Arc::new(RwLock::new(HashSet::new())),
                calls: Arc::new(RwLock::new(Vec::new())),
                delay: None,
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Holds every delivery for `delay` before answering.
        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Scripts a fixed outcome for one identity.
        pub async fn set_outcome(&self, identity: &str, outcome: DeliveryOutcome) {
            self.set_sequence(identity, vec![outcome]).await;
        }

        /// Scripts a sequence of outcomes for one identity.
        pub async fn set_sequence(&self, identity: &str, outcomes: Vec<DeliveryOutcome>) {
            self.scripts.write().await.insert(identity.to_string(), outcomes.into());
        }

        /// Outcome for identities without a script.
        pub async fn set_default(&self, outcome: DeliveryOutcome) {
            *self.default_outcome.write().await = outcome;
        }

        /// Makes deliveries to `identity` panic.
        pub async fn panic_on(&self, identity: &str) {
            self.panics.write().await.insert(identity.to_string());
        }

        /// Identities delivered to, in call order.
        pub async fn calls(&self) -> Vec<String> {
            self.calls.read().await.iter().map(|(identity, _)| identity.clone()).collect()
        }

        /// Payloads delivered to `identity`.
        pub async fn payloads_for(&self, identity: &str) -> Vec<Bytes> {
            self.calls
                .read()
                .await
                .iter()
                .filter(|(called, _)| called == identity)
                .map(|(_, payload)| payload.clone())
                .collect()
        }

        /// Number of deliveries attempted for `identity`.
        pub async fn call_count_for(&self, identity: &str) -> usize {
            self.calls.read().await.iter().filter(|(called, _)| called == identity).count()
        }

        /// Highest number of deliveries observed in flight at once.
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::Acquire)
        }

        async fn next_outcome(&self, identity: &str) -> DeliveryOutcome {
            let mut scripts = self.scripts.write().await;
            match scripts.get_mut(identity) {
                Some(queue) if queue.len() > 1 => {
                    queue.pop_front().unwrap_or(DeliveryOutcome::Delivered)
                },
                Some(queue) if !queue.is_empty() => queue[0].clone(),
                _ => self.default_outcome.read().await.clone(),
            }
        }
    }

    #[async_trait]
    impl PushTransport for MockTransport {
        async fn deliver(&self, endpoint: &Endpoint, payload: &Bytes) -> DeliveryOutcome {
            let identity = endpoint.identity().as_str();
            self.calls.write().await.push((identity.to_string(), payload.clone()));

            let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
            self.max_in_flight.fetch_max(current, Ordering::AcqRel);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            let outcome = self.next_outcome(identity).await;
            self.in_flight.fetch_sub(1, Ordering::AcqRel);

            assert!(!self.panics.read().await.contains(identity), "scripted delivery panic");
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
    use p256::{ecdsa::SigningKey, elliptic_curve::rand_core::OsRng};
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::outcome::RejectionClass;

    fn browser_endpoint(url: String) -> Endpoint {
        let browser_key = SigningKey::random(&mut OsRng);
        let p256dh = BASE64URL.encode(browser_key.verifying_key().to_encoded_point(false).as_bytes());
        let auth = BASE64URL.encode(rand::random::<[u8; 16]>());
        Endpoint::from_parts(url, p256dh, auth).unwrap()
    }

    fn client() -> WebPushClient {
        let sender = WebPushConfig::new(VapidKeys::generate(), "mailto:ops@example.com");
        WebPushClient::new(ClientConfig::default(), sender).unwrap()
    }

    async fn deliver_with_status(status: u16) -> DeliveryOutcome {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/push/abc"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;

        let endpoint = browser_endpoint(format!("{}/push/abc", mock_server.uri()));
        client().deliver(&endpoint, &Bytes::from_static(b"{\"title\":\"t\"}")).await
    }

    #[tokio::test]
    async fn successful_delivery() {
        assert_eq!(deliver_with_status(201).await, DeliveryOutcome::Delivered);
    }

    #[tokio::test]
    async fn gone_and_not_found_are_dead() {
        for status in [404, 410] {
            let outcome = deliver_with_status(status).await;
            assert!(outcome.is_permanently_dead(), "status {status} should be dead");
        }
    }

    #[tokio::test]
    async fn ambiguous_statuses_are_not_dead() {
        for (status, class) in [
            (400, RejectionClass::ClientError),
            (403, RejectionClass::ClientError),
            (429, RejectionClass::Transient),
            (500, RejectionClass::Transient),
        ] {
            match deliver_with_status(status).await {
                DeliveryOutcome::Rejected(reason) => assert_eq!(reason.class(), class),
                other => panic!("expected rejection for {status}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn encrypted_request_carries_push_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::header("Content-Encoding", "aes128gcm"))
            .and(matchers::header("TTL", "86400"))
            .and(matchers::header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let endpoint = browser_endpoint(format!("{}/push/headers", mock_server.uri()));
        let outcome = client().deliver(&endpoint, &Bytes::from_static(b"payload")).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered);
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "120"))
            .mount(&mock_server)
            .await;

        let endpoint = browser_endpoint(format!("{}/push/limited", mock_server.uri()));
        let outcome = client().deliver(&endpoint, &Bytes::from_static(b"x")).await;

        assert_eq!(outcome.retry_after_seconds(), Some(120));
        assert!(outcome.is_retryable());
    }

    #[tokio::test]
    async fn invalid_credentials_become_transport_error() {
        let endpoint =
            Endpoint::from_parts("https://push.example.com/bad", "not-a-key", "short").unwrap();

        match client().deliver(&endpoint, &Bytes::from_static(b"x")).await {
            DeliveryOutcome::TransportError(error) => assert!(!error.is_retryable()),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        let endpoint = browser_endpoint("http://127.0.0.1:9/push/closed".to_string());

        match client().deliver(&endpoint, &Bytes::from_static(b"x")).await {
            DeliveryOutcome::TransportError(error) => assert!(error.is_retryable()),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn subject_must_be_contact_uri() {
        let sender = WebPushConfig::new(VapidKeys::generate(), "ops@example.com");
        assert!(WebPushClient::new(ClientConfig::default(), sender).is_err());
    }

    #[test]
    fn retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_retry_after_seconds(&headers), None);

        headers.insert(reqwest::header::RETRY_AFTER, "120".parse().unwrap());
        assert_eq!(extract_retry_after_seconds(&headers), Some(120));

        headers.insert(reqwest::header::RETRY_AFTER, "invalid".parse().unwrap());
        assert_eq!(extract_retry_after_seconds(&headers), Some(60));

        headers.insert(reqwest::header::RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(extract_retry_after_seconds(&headers), Some(0));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 100), "short");
    }

    #[tokio::test]
    async fn mock_sequences_repeat_last_outcome() {
        let transport = mock::MockTransport::new();
        transport
            .set_sequence("https://push.example.com/a", vec![
                DeliveryOutcome::rejected(503),
                DeliveryOutcome::Delivered,
            ])
            .await;

        let endpoint = Endpoint::from_parts("https://push.example.com/a", "k", "a").unwrap();
        let payload = Bytes::from_static(b"x");

        assert_eq!(transport.deliver(&endpoint, &payload).await, DeliveryOutcome::rejected(503));
        assert_eq!(transport.deliver(&endpoint, &payload).await, DeliveryOutcome::Delivered);
        assert_eq!(transport.deliver(&endpoint, &payload).await, DeliveryOutcome::Delivered);
        assert_eq!(transport.call_count_for("https://push.example.com/a").await, 3);
    }
}
