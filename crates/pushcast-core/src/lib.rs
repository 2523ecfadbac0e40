//! Core domain types for the pushcast fanout engine.
//!
//! Provides the validated endpoint model, the in-memory endpoint registry
//! that every broadcast snapshots, the error taxonomy, and the clock
//! abstraction used to keep retry timing deterministic in tests. The
//! delivery and API crates build on these types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod registry;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{CredentialMaterial, Endpoint, EndpointIdentity, EndpointSummary};
pub use registry::EndpointRegistry;
pub use time::{Clock, RealClock, TestClock};
