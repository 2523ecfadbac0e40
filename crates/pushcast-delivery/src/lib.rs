//! Web push delivery and broadcast fanout.
//!
//! This crate turns a registry snapshot into concurrent push deliveries and
//! folds the per-endpoint outcomes back into eviction decisions.
//!
//! # Architecture
//!
//! 1. **Transport** - [`WebPushClient`] encrypts and signs one message and
//!    posts it to one push service, reducing the response to a
//!    [`DeliveryOutcome`]
//! 2. **Classification** - every rejection maps to a [`RejectionClass`];
//!    only `PermanentlyDead` (404, 410) leads to eviction
//! 3. **Fanout** - [`FanoutDispatcher`] delivers to every endpoint
//!    concurrently, optionally bounded and retried, and evicts dead
//!    endpoints as their outcomes arrive
//! 4. **Single target** - [`SingleTargetDispatcher`] delivers to the most
//!    recent endpoint and never touches the registry
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pushcast_core::EndpointRegistry;
//! use pushcast_delivery::{
//!     ClientConfig, FanoutConfig, FanoutDispatcher, NotificationPayload, VapidKeys,
//!     WebPushClient, WebPushConfig,
//! };
//!
//! # async fn example() -> pushcast_delivery::Result<()> {
//! let registry = Arc::new(EndpointRegistry::new());
//! let sender = WebPushConfig::new(VapidKeys::generate(), "mailto:ops@example.com");
//! let client = WebPushClient::new(ClientConfig::default(), sender)?;
//!
//! let dispatcher = FanoutDispatcher::new(registry, Arc::new(client), FanoutConfig::default());
//! let report = dispatcher.broadcast(&NotificationPayload::new("Hello", "World", None)).await;
//! println!("delivered {} of {}", report.delivered, report.attempted);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod fanout;
pub mod outcome;
pub mod payload;
pub mod retry;
pub mod single;
pub mod transport;
pub mod vapid;

pub use error::{DeliveryError, ErrorCategory, Result};
pub use fanout::{BroadcastReport, FanoutConfig, FanoutDispatcher};
pub use outcome::{DeliveryOutcome, FailureDescriptor, RejectionClass, RejectionReason};
pub use payload::NotificationPayload;
pub use retry::{BackoffStrategy, RetryPolicy};
pub use single::{SingleDispatchResult, SingleTargetDispatcher};
pub use transport::{ClientConfig, PushTransport, Urgency, WebPushClient, WebPushConfig};
pub use vapid::VapidKeys;

/// Default push request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
