//! Pushcast push-notification fanout service.
//!
//! Main entry point for the pushcast server. Loads configuration, wires
//! the registry, push client, and dispatchers together, and serves the
//! HTTP API until shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use pushcast_api::{AppState, Config, PushoverRelay};
use pushcast_core::EndpointRegistry;
use pushcast_delivery::WebPushClient;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log)?;

    info!("Starting pushcast notification service");
    info!(config = ?config, "Configuration loaded");

    let vapid = config.resolve_vapid_keys()?;
    let vapid_public_key = vapid.public_key_base64url().to_string();

    let client = WebPushClient::new(config.to_client_config(), config.to_web_push_config(vapid))
        .context("Failed to create web push client")?;

    let registry = Arc::new(EndpointRegistry::new());
    let mut state =
        AppState::new(registry, Arc::new(client), config.to_fanout_config(), vapid_public_key);

    if let Some(relay_config) = config.to_relay_config() {
        let relay = PushoverRelay::new(relay_config).context("Failed to create Pushover relay")?;
        state = state.with_relay(relay);
        info!("Pushover relay enabled");
    }

    match config.api_secret() {
        Some(secret) => state = state.with_api_secret(secret),
        None => info!("No API secret configured, broadcast routes are open"),
    }

    let addr = config.parse_server_addr()?;
    pushcast_api::start_server(state, addr, Duration::from_secs(config.request_timeout))
        .await
        .context("HTTP server failed")?;

    info!("pushcast shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
///
/// `RUST_LOG` in the process environment wins over the configured level.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}
