// Transport configuration for building the dashboard `reqwest::Client`.
//
// Holds everything that is fixed at startup: base URL, credential,
// timeouts, the concurrency budget and the retry policy.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Default dashboard API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1";

/// Retry policy for rate-limited and transient responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; doubled on every retry.
    pub backoff: Duration,
    /// Upper bound on a single delay, including `Retry-After` hints.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Transport configuration for the dashboard client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
    /// Size of the process-wide request permit pool.
    pub max_concurrent_requests: usize,
    pub retry: RetryPolicy,
    /// Page size requested from paginated endpoints.
    pub per_page: u32,
}

impl TransportConfig {
    /// Create a config with defaults for everything but the credential.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            timeout: Duration::from_secs(30),
            max_concurrent_requests: 5,
            retry: RetryPolicy::default(),
            per_page: 1000,
        }
    }

    /// Build a `reqwest::Client` that injects the API key on every request.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret()))
            .map_err(|e| Error::Config(format!("invalid API key header: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("meraki-exporter/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
    }
}
