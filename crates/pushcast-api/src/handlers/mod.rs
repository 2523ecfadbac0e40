//! HTTP request handlers for the pushcast API.
//!
//! Handlers validate input at the boundary, translate it into registry or
//! dispatcher calls, and shape the result as JSON. Errors leave through
//! [`ApiError`](crate::error::ApiError).
//!
//! - `subscribe` - browser subscription registration
//! - `subscriptions` - registry inspection and reset
//! - `broadcast` - fanout and single-target sends
//! - `health` - health, liveness, and VAPID public key

pub mod broadcast;
pub mod health;
pub mod subscribe;
pub mod subscriptions;

pub use broadcast::{broadcast, broadcast_latest};
pub use health::{health_check, liveness_check, vapid_public_key};
pub use subscribe::subscribe;
pub use subscriptions::{clear_subscriptions, list_subscriptions};
