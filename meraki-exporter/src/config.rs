//! Configuration for the Meraki exporter.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use meraki_dashboard::{DEFAULT_BASE_URL, RetryPolicy, TransportConfig};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Dashboard API connection settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// HTTP endpoint settings.
    #[serde(default)]
    pub exporter: ServerConfig,

    /// Per-request scrape settings.
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Which collectors run and how far back they look.
    #[serde(default)]
    pub collect: CollectConfig,

    /// Metric filtering settings.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dashboard API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// API base URL (default: "https://api.meraki.com/api/v1").
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. The CLI flag and `MERAKI_API_KEY` take precedence.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request HTTP timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Size of the process-wide request permit pool.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Retries after the first attempt for rate-limited or transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry delay, doubled per attempt (milliseconds).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Page size for paginated listings.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_concurrent_requests() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_per_page() -> u32 {
    1000
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            per_page: default_per_page(),
        }
    }
}

impl DashboardConfig {
    /// Build the client transport settings for the given key.
    pub fn transport(&self, api_key: SecretString) -> TransportConfig {
        let mut transport = TransportConfig::new(api_key);
        transport.base_url = self.base_url.clone();
        transport.timeout = Duration::from_secs(self.timeout_secs);
        transport.max_concurrent_requests = self.max_concurrent_requests;
        transport.per_page = self.per_page;
        transport.retry = RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
            ..RetryPolicy::default()
        };
        transport
    }
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (default: "0.0.0.0:9822").
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:9822".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerConfig {
    /// Parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid listen address: {}", self.listen)))
    }
}

/// Scrape deadline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Deadline for one scrape request, topology included (seconds).
    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,
}

fn default_scrape_timeout() -> u64 {
    50
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout(),
        }
    }
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How VPN peer reachability is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerAggregation {
    /// One sample per device: 1 iff every peer of that kind is reachable.
    #[default]
    PerDevice,
    /// One sample per peer carrying the peer's identifying labels.
    PerPeer,
}

/// Collector selection and lookback windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Enable the VPN collector.
    #[serde(default)]
    pub vpn: bool,

    /// Enable the switch-port and wireless usage collectors.
    #[serde(default)]
    pub usage: bool,

    /// VPN peer reachability reporting.
    #[serde(default)]
    pub vpn_peers: PeerAggregation,

    /// Destination probed for uplink loss and latency.
    #[serde(default = "default_latency_probe_ip")]
    pub latency_probe_ip: String,

    #[serde(default = "default_latency_timespan")]
    pub latency_timespan_secs: u64,

    #[serde(default = "default_switch_usage_timespan")]
    pub switch_usage_timespan_secs: u64,

    #[serde(default = "default_wireless_timespan")]
    pub wireless_timespan_secs: u64,
}

fn default_latency_probe_ip() -> String {
    "8.8.8.8".to_string()
}

fn default_latency_timespan() -> u64 {
    120
}

fn default_switch_usage_timespan() -> u64 {
    7200 // 2 hours
}

fn default_wireless_timespan() -> u64 {
    300 // 5 minutes
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            vpn: false,
            usage: false,
            vpn_peers: PeerAggregation::default(),
            latency_probe_ip: default_latency_probe_ip(),
            latency_timespan_secs: default_latency_timespan(),
            switch_usage_timespan_secs: default_switch_usage_timespan(),
            wireless_timespan_secs: default_wireless_timespan(),
        }
    }
}

/// Metric filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for metrics to include (empty = all).
    #[serde(default)]
    pub include_metrics: Vec<String>,

    /// Glob patterns for metrics to exclude.
    #[serde(default)]
    pub exclude_metrics: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.dashboard.base_url).is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid dashboard base_url: {}",
                self.dashboard.base_url
            )));
        }

        if self.dashboard.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "dashboard timeout_secs must be > 0".to_string(),
            ));
        }

        if self.dashboard.max_concurrent_requests == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_requests must be > 0".to_string(),
            ));
        }

        if !(1..=1000).contains(&self.dashboard.per_page) {
            return Err(ConfigError::Validation(
                "per_page must be between 1 and 1000".to_string(),
            ));
        }

        if self.scrape.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scrape timeout_secs must be > 0".to_string(),
            ));
        }

        if self.collect.latency_probe_ip.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid latency_probe_ip: {}",
                self.collect.latency_probe_ip
            )));
        }

        self.exporter.listen_addr()?;

        Ok(())
    }
}
