//! Configuration management for the pushcast service.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use pushcast_delivery::{
    BackoffStrategy, ClientConfig, FanoutConfig, RetryPolicy, Urgency, VapidKeys, WebPushConfig,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::relay::RelayConfig;

const CONFIG_FILE: &str = "config.toml";

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// # Example
///
/// ```no_run
/// use pushcast_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // Sender identity
    /// Base64url raw P-256 private key.
    ///
    /// Environment variable: `VAPID_PRIVATE_KEY`
    #[serde(default, alias = "VAPID_PRIVATE_KEY")]
    pub vapid_private_key: Option<String>,
    /// Base64url uncompressed P-256 public key.
    ///
    /// Environment variable: `VAPID_PUBLIC_KEY`
    #[serde(default, alias = "VAPID_PUBLIC_KEY")]
    pub vapid_public_key: Option<String>,
    /// VAPID contact claim.
    ///
    /// Environment variable: `VAPID_SUBJECT`
    #[serde(default = "default_vapid_subject", alias = "VAPID_SUBJECT")]
    pub vapid_subject: String,
    /// Push message time-to-live in seconds.
    ///
    /// Environment variable: `PUSH_TTL_SECONDS`
    #[serde(default = "default_push_ttl", alias = "PUSH_TTL_SECONDS")]
    pub push_ttl_seconds: u32,
    /// Push message urgency (`very-low`, `low`, `normal`, `high`).
    ///
    /// Environment variable: `PUSH_URGENCY`
    #[serde(default, alias = "PUSH_URGENCY")]
    pub push_urgency: Option<Urgency>,

    // Delivery
    /// Push request timeout in seconds.
    ///
    /// Environment variable: `DELIVERY_TIMEOUT_SECONDS`
    #[serde(default = "default_delivery_timeout", alias = "DELIVERY_TIMEOUT_SECONDS")]
    pub delivery_timeout_seconds: u64,
    /// Deliveries in flight per broadcast, 0 for unbounded.
    ///
    /// Environment variable: `MAX_CONCURRENT_DELIVERIES`
    #[serde(default, alias = "MAX_CONCURRENT_DELIVERIES")]
    pub max_concurrent_deliveries: usize,

    // Retry
    /// Maximum delivery attempts per endpoint and broadcast.
    ///
    /// Environment variable: `MAX_RETRY_ATTEMPTS`
    #[serde(default = "default_retry_attempts", alias = "MAX_RETRY_ATTEMPTS")]
    pub max_retry_attempts: u32,
    /// Base delay for exponential backoff in milliseconds.
    ///
    /// Environment variable: `RETRY_BASE_DELAY_MS`
    #[serde(default = "default_base_delay_ms", alias = "RETRY_BASE_DELAY_MS")]
    pub retry_base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    ///
    /// Environment variable: `RETRY_MAX_DELAY_MS`
    #[serde(default = "default_max_delay_ms", alias = "RETRY_MAX_DELAY_MS")]
    pub retry_max_delay_ms: u64,
    /// Jitter factor for retry timing (0.0 to 1.0).
    ///
    /// Environment variable: `RETRY_JITTER_FACTOR`
    #[serde(default = "default_jitter_factor", alias = "RETRY_JITTER_FACTOR")]
    pub retry_jitter_factor: f64,

    // Authorization
    /// Shared secret guarding broadcast and inspection routes.
    ///
    /// Environment variable: `API_SECRET`
    #[serde(default, alias = "API_SECRET")]
    pub api_secret: Option<String>,

    // Relay
    /// Pushover application token.
    ///
    /// Environment variable: `PUSHOVER_TOKEN`
    #[serde(default, alias = "PUSHOVER_TOKEN")]
    pub pushover_token: Option<String>,
    /// Pushover user key.
    ///
    /// Environment variable: `PUSHOVER_USER`
    #[serde(default, alias = "PUSHOVER_USER")]
    pub pushover_user: Option<String>,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the VAPID keypair, generating an ephemeral one when none is
    /// configured.
    pub fn resolve_vapid_keys(&self) -> Result<VapidKeys> {
        match (non_empty(&self.vapid_public_key), non_empty(&self.vapid_private_key)) {
            (Some(public), Some(private)) => {
                VapidKeys::from_base64url(public, private).context("Invalid VAPID key pair")
            },
            (None, None) => {
                let keys = VapidKeys::generate();
                warn!(
                    public_key = keys.public_key_base64url(),
                    "no VAPID keys configured, generated an ephemeral pair; \
                     browser subscriptions will not survive a restart"
                );
                Ok(keys)
            },
            _ => anyhow::bail!("VAPID_PUBLIC_KEY and VAPID_PRIVATE_KEY must be set together"),
        }
    }

    /// Convert to the sender identity for the push client.
    pub fn to_web_push_config(&self, vapid: VapidKeys) -> WebPushConfig {
        WebPushConfig {
            ttl_seconds: self.push_ttl_seconds,
            urgency: self.push_urgency,
            ..WebPushConfig::new(vapid, self.vapid_subject.clone())
        }
    }

    /// Convert to client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.delivery_timeout_seconds),
            ..ClientConfig::default()
        }
    }

    /// Convert to retry policy.
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            jitter_factor: self.retry_jitter_factor,
            backoff_strategy: BackoffStrategy::Exponential,
        }
    }

    /// Convert to fanout configuration.
    pub fn to_fanout_config(&self) -> FanoutConfig {
        FanoutConfig {
            max_concurrency: self.max_concurrent_deliveries,
            retry: self.to_retry_policy(),
        }
    }

    /// Relay configuration, `None` unless both Pushover keys are set.
    pub fn to_relay_config(&self) -> Option<RelayConfig> {
        match (non_empty(&self.pushover_token), non_empty(&self.pushover_user)) {
            (Some(token), Some(user)) => Some(RelayConfig::new(token, user)),
            _ => None,
        }
    }

    /// Shared secret, `None` when unset or blank.
    pub fn api_secret(&self) -> Option<&str> {
        non_empty(&self.api_secret)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.delivery_timeout_seconds == 0 {
            anyhow::bail!("delivery_timeout_seconds must be greater than 0");
        }

        if self.max_retry_attempts == 0 {
            anyhow::bail!("max_retry_attempts must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.retry_jitter_factor) {
            anyhow::bail!("retry_jitter_factor must be between 0.0 and 1.0");
        }

        if !(self.vapid_subject.starts_with("mailto:") || self.vapid_subject.starts_with("https:"))
        {
            anyhow::bail!("vapid_subject must be a mailto: or https: URI");
        }

        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("vapid_public_key", &self.vapid_public_key)
            .field("vapid_private_key", &self.vapid_private_key.as_ref().map(|_| "***"))
            .field("vapid_subject", &self.vapid_subject)
            .field("push_ttl_seconds", &self.push_ttl_seconds)
            .field("push_urgency", &self.push_urgency)
            .field("delivery_timeout_seconds", &self.delivery_timeout_seconds)
            .field("max_concurrent_deliveries", &self.max_concurrent_deliveries)
            .field("max_retry_attempts", &self.max_retry_attempts)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("pushover_token", &self.pushover_token.as_ref().map(|_| "***"))
            .field("pushover_user", &self.pushover_user)
            .field("rust_log", &self.rust_log)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: default_vapid_subject(),
            push_ttl_seconds: default_push_ttl(),
            push_urgency: None,
            delivery_timeout_seconds: default_delivery_timeout(),
            max_concurrent_deliveries: 0,
            max_retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_base_delay_ms(),
            retry_max_delay_ms: default_max_delay_ms(),
            retry_jitter_factor: default_jitter_factor(),
            api_secret: None,
            pushover_token: None,
            pushover_user: None,
            rust_log: default_log_level(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_vapid_subject() -> String {
    "mailto:admin@localhost".to_string()
}

fn default_push_ttl() -> u32 {
    86_400
}

fn default_delivery_timeout() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_jitter_factor() -> f64 {
    0.25
}

fn default_log_level() -> String {
    "info,pushcast=debug,tower_http=debug".to_string()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, env, sync::Mutex};

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct TestEnvGuard {
        _lock: std::sync::MutexGuard<'static, ()>,
        vars: Vec<String>,
        originals: HashMap<String, Option<String>>,
    }

    impl TestEnvGuard {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Self { _lock: lock, vars: Vec::new(), originals: HashMap::new() }
        }

        fn set_var(&mut self, key: &str, value: &str) {
            if !self.vars.contains(&key.to_string()) {
                self.originals.insert(key.to_string(), env::var(key).ok());
                self.vars.push(key.to_string());
            }
            env::set_var(key, value);
        }
    }

    impl Drop for TestEnvGuard {
        fn drop(&mut self) {
            for var in &self.vars {
                match self.originals.get(var) {
                    Some(Some(value)) => env::set_var(var, value),
                    Some(None) => env::remove_var(var),
                    None => {},
                }
            }
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.max_retry_attempts, 1);
        assert_eq!(config.max_concurrent_deliveries, 0);
        assert!(config.to_relay_config().is_none());
        assert!(config.api_secret().is_none());
    }

    #[test]
    fn env_overrides_defaults() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("PORT", "9191");
        guard.set_var("MAX_CONCURRENT_DELIVERIES", "16");
        guard.set_var("MAX_RETRY_ATTEMPTS", "3");
        guard.set_var("RETRY_BASE_DELAY_MS", "250");
        guard.set_var("DELIVERY_TIMEOUT_SECONDS", "7");
        guard.set_var("VAPID_SUBJECT", "mailto:push@example.com");
        guard.set_var("PUSH_URGENCY", "high");
        guard.set_var("API_SECRET", "hunter2");

        let config = Config::load().expect("config should load with env overrides");

        assert_eq!(config.port, 9191);
        assert_eq!(config.vapid_subject, "mailto:push@example.com");
        assert_eq!(config.push_urgency, Some(Urgency::High));
        assert_eq!(config.api_secret(), Some("hunter2"));

        let fanout = config.to_fanout_config();
        assert_eq!(fanout.max_concurrency, 16);
        assert_eq!(fanout.retry.max_attempts, 3);
        assert_eq!(fanout.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.to_client_config().timeout, Duration::from_secs(7));
    }

    #[test]
    fn relay_requires_both_keys() {
        let mut config = Config { pushover_token: Some("token".into()), ..Config::default() };
        assert!(config.to_relay_config().is_none());

        config.pushover_user = Some("user".into());
        let relay = config.to_relay_config().expect("relay configured");
        assert_eq!(relay.token, "token");
        assert_eq!(relay.user, "user");

        config.pushover_user = Some("   ".into());
        assert!(config.to_relay_config().is_none());
    }

    #[test]
    fn vapid_keys_generated_when_absent() {
        let config = Config::default();
        let keys = config.resolve_vapid_keys().expect("ephemeral keys");
        assert!(!keys.public_key_base64url().is_empty());
    }

    #[test]
    fn vapid_keys_loaded_when_configured() {
        let generated = VapidKeys::generate();
        let config = Config {
            vapid_public_key: Some(generated.public_key_base64url().to_string()),
            vapid_private_key: Some(generated.private_key_base64url().to_string()),
            ..Config::default()
        };

        assert_eq!(config.resolve_vapid_keys().unwrap(), generated);
    }

    #[test]
    fn half_configured_vapid_keys_rejected() {
        let generated = VapidKeys::generate();
        let config = Config {
            vapid_public_key: Some(generated.public_key_base64url().to_string()),
            ..Config::default()
        };

        assert!(config.resolve_vapid_keys().is_err());
    }

    #[test]
    fn invalid_config_validation_fails() {
        let mut config = Config { port: 0, ..Config::default() };
        assert!(config.validate().is_err());

        config = Config { max_retry_attempts: 0, ..Config::default() };
        assert!(config.validate().is_err());

        config = Config { retry_jitter_factor: 1.5, ..Config::default() };
        assert!(config.validate().is_err());

        config = Config { vapid_subject: "admin@example.com".into(), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_masks_secrets() {
        let config = Config {
            api_secret: Some("hunter2".into()),
            vapid_private_key: Some("private-scalar".into()),
            ..Config::default()
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("private-scalar"));
    }

    #[test]
    fn socket_address_parsing() {
        let config = Config { host: "127.0.0.1".into(), port: 9000, ..Config::default() };

        let addr = config.parse_server_addr().expect("Should parse socket address");

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 9000);
    }
}
