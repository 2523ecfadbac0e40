//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. CORS handling
//! 4. Shared-secret check (broadcast and inspection routes only)
//! 5. Timeout enforcement (every route except the broadcast routes)
//! 6. Handler execution
//!
//! Broadcasts run until every delivery has an outcome. Their duration is
//! bounded by the delivery timeout and retry policy, not by the request
//! timeout, so a slow fanout still answers with its full report.
//!
//! # Graceful Shutdown
//!
//! The server stops accepting connections on CTRL+C or SIGTERM and waits
//! for in-flight broadcasts to finish before returning.

use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{handlers, middleware::auth::require_secret, AppState};

/// Creates the Axum router with all routes and middleware.
///
/// Subscription, health, and VAPID key routes are open so browsers can
/// reach them; broadcast and registry inspection sit behind the shared
/// secret when one is configured.
///
/// # Example
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
///
/// use pushcast_api::{server::create_router, AppState};
/// use pushcast_core::EndpointRegistry;
/// use pushcast_delivery::{
///     ClientConfig, FanoutConfig, VapidKeys, WebPushClient, WebPushConfig,
/// };
///
/// # fn main() -> pushcast_delivery::Result<()> {
/// let vapid = VapidKeys::generate();
/// let public_key = vapid.public_key_base64url().to_string();
/// let sender = WebPushConfig::new(vapid, "mailto:ops@example.com");
/// let client = WebPushClient::new(ClientConfig::default(), sender)?;
///
/// let state = AppState::new(
///     Arc::new(EndpointRegistry::new()),
///     Arc::new(client),
///     FanoutConfig::default(),
///     public_key,
/// );
/// let app = create_router(state, Duration::from_secs(30));
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let open_routes = Router::new()
        .route("/subscribe", post(handlers::subscribe))
        .route("/vapid-public-key", get(handlers::vapid_public_key))
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check))
        .layer(TimeoutLayer::new(request_timeout));

    let inspection_routes = Router::new()
        .route(
            "/subscriptions",
            get(handlers::list_subscriptions).delete(handlers::clear_subscriptions),
        )
        .layer(TimeoutLayer::new(request_timeout));

    let broadcast_routes = Router::new()
        .route("/broadcast", post(handlers::broadcast))
        .route("/broadcast/latest", post(handlers::broadcast_latest));

    let protected_routes = Router::new()
        .merge(inspection_routes)
        .merge(broadcast_routes)
        .layer(middleware::from_fn_with_state(state.clone(), require_secret));

    Router::new()
        .merge(open_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound.
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    request_timeout: Duration,
) -> Result<(), std::io::Error> {
    let app = create_router(state, request_timeout);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight broadcasts to complete");
}
