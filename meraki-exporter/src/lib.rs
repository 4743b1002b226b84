//! Prometheus exporter for Meraki dashboard organizations.
//!
//! Every scrape of `/?target=<organization id>` resolves the organization's
//! device topology, runs the enabled collectors concurrently under one
//! deadline, and renders the merged samples in the Prometheus text format.
//! Nothing is cached between scrapes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌────────────┐    ┌────────────┐    ┌────────────┐
//! │  Dashboard  │───>│  Topology  │───>│ Collectors │───>│ Aggregator │
//! │     API     │───>│   index    │    │  (device,  │    │  + render  │
//! └─────────────┘    └────────────┘    │ vpn, ...)  │    └─────┬──────┘
//!        │                             └────────────┘          │
//!        │           ┌────────────┐                      ┌─────▼──────┐
//!        └──────────>│  Targets   │─────────────────────>│ HTTP server│
//!                    └────────────┘                      └────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! MERAKI_API_KEY=... meraki-exporter --usage --vpn
//! curl 'http://localhost:9822/?target=549236'
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod aggregator;
pub mod collectors;
pub mod config;
pub mod exposition;
pub mod http;
pub mod sample;
pub mod scrape;
pub mod targets;
pub mod topology;

pub use aggregator::SampleSet;
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use scrape::{ScrapeError, Scraper};

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` directives take precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,meraki_exporter={0},meraki_dashboard={0}",
            config.level
        ))
    });

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
