//! Async client for the Meraki dashboard API.
//!
//! Covers the read-only endpoints needed to build a device topology and
//! collect status, uplink, VPN, switch-port and wireless telemetry:
//!
//! - [`client`] - HTTP mechanics (permit pool, retry with backoff, pagination)
//! - [`models`] - typed response shapes
//! - [`transport`] - client construction and retry policy
//! - [`error`] - upstream error taxonomy

pub mod client;
mod endpoints;
pub mod error;
pub mod models;
pub mod transport;

pub use client::DashboardClient;
pub use error::{Error, ErrorKind, Result};
pub use models::ProductType;
pub use transport::{DEFAULT_BASE_URL, RetryPolicy, TransportConfig};
