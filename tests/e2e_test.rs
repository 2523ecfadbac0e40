//! End-to-end tests.
//!
//! Browser subscriptions register through the HTTP API and broadcasts go
//! out through the real web push client to wiremock push services, so the
//! encryption, VAPID signing, and eviction paths run together.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::{ecdsa::SigningKey, elliptic_curve::rand_core::OsRng};
use pushcast_api::{create_router, AppState};
use pushcast_core::EndpointRegistry;
use pushcast_delivery::{ClientConfig, FanoutConfig, VapidKeys, WebPushClient, WebPushConfig};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn app(registry: Arc<EndpointRegistry>) -> Router {
    let vapid = VapidKeys::generate();
    let public_key = vapid.public_key_base64url().to_string();
    let sender = WebPushConfig::new(vapid, "mailto:ops@example.com");
    let client = WebPushClient::new(ClientConfig::default(), sender).unwrap();

    let state = AppState::new(registry, Arc::new(client), FanoutConfig::default(), public_key)
        .with_api_secret("e2e-secret");
    create_router(state, Duration::from_secs(30))
}

fn browser_subscription(endpoint: &str) -> Value {
    let browser_key = SigningKey::random(&mut OsRng);
    let p256dh = BASE64URL.encode(browser_key.verifying_key().to_encoded_point(false).as_bytes());
    let auth = BASE64URL.encode(rand::random::<[u8; 16]>());
    json!({ "endpoint": endpoint, "keys": { "p256dh": p256dh, "auth": auth } })
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("failed to make request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post(uri: &str, body: &Value, secret: Option<&str>) -> Request<Body> {
    let mut builder =
        Request::builder().method("POST").uri(uri).header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("authorization", format!("Bearer {secret}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn push_service(path: &str, status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path(path))
        .and(matchers::header("content-encoding", "aes128gcm"))
        .and(matchers::header_exists("authorization"))
        .and(matchers::header_exists("ttl"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn broadcast_delivers_encrypted_and_prunes_gone_endpoints() {
    let live = push_service("/push/live", 201).await;
    let gone = push_service("/push/gone", 410).await;
    let registry = Arc::new(EndpointRegistry::new());
    let app = app(registry.clone());

    let live_url = format!("{}/push/live", live.uri());
    let gone_url = format!("{}/push/gone", gone.uri());
    for url in [&live_url, &gone_url] {
        let (status, _) = call(&app, post("/subscribe", &browser_subscription(url), None)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let notification = json!({ "title": "Deploy", "body": "v2 is live", "url": "/releases" });
    let (status, body) = call(&app, post("/broadcast", &notification, Some("e2e-secret"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempted"], 2);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["removed"], 1);
    assert_eq!(body["active"], 1);
    assert_eq!(body["failures"][0]["kind"], "rejected");
    assert_eq!(body["failures"][0]["status"], 410);

    let remaining = registry.snapshot().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].identity().as_str(), live_url);

    let received = live.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(!received[0].body.is_empty());
    assert!(!String::from_utf8_lossy(&received[0].body).contains("v2 is live"));
}

#[tokio::test]
async fn second_broadcast_skips_pruned_endpoint() {
    let gone = push_service("/push/gone", 404).await;
    let registry = Arc::new(EndpointRegistry::new());
    let app = app(registry.clone());

    let gone_url = format!("{}/push/gone", gone.uri());
    call(&app, post("/subscribe", &browser_subscription(&gone_url), None)).await;

    let notification = json!({ "title": "t", "body": "b" });
    let (_, first) = call(&app, post("/broadcast", &notification, Some("e2e-secret"))).await;
    let (_, second) = call(&app, post("/broadcast", &notification, Some("e2e-secret"))).await;

    assert_eq!(first["removed"], 1);
    assert_eq!(second["attempted"], 0);
    assert_eq!(gone.received_requests().await.unwrap().len(), 1);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn rate_limited_endpoint_is_kept() {
    let limited = push_service("/push/limited", 429).await;
    let registry = Arc::new(EndpointRegistry::new());
    let app = app(registry.clone());

    let url = format!("{}/push/limited", limited.uri());
    call(&app, post("/subscribe", &browser_subscription(&url), None)).await;

    let notification = json!({ "title": "t", "body": "b" });
    let (status, body) = call(&app, post("/broadcast", &notification, Some("e2e-secret"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], 0);
    assert_eq!(body["removed"], 0);
    assert_eq!(body["failures"][0]["class"], "transient");
    assert_eq!(registry.count().await, 1);
}

#[tokio::test]
async fn vapid_public_key_is_served() {
    let app = app(Arc::new(EndpointRegistry::new()));
    let request = Request::builder().uri("/vapid-public-key").body(Body::empty()).unwrap();

    let (status, body) = call(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let key = BASE64URL.decode(body["public_key"].as_str().unwrap()).unwrap();
    assert_eq!(key.len(), 65);
    assert_eq!(key[0], 0x04);
}
