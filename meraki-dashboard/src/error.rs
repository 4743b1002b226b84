//! Error types for dashboard API calls.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an upstream failure.
///
/// Callers decide between failing the whole scrape and degrading the output
/// based on this value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credential rejected by the dashboard.
    AuthFailure,
    /// The requested resource (usually an organization) does not exist.
    NotFound,
    /// Timeout, rate limit, connection failure or 5xx.
    UpstreamTransient,
    /// The payload did not match the expected shape.
    MalformedResponse,
}

impl ErrorKind {
    /// Get the string representation used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UpstreamTransient => "upstream_transient",
            ErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`DashboardClient`](crate::DashboardClient).
#[derive(Debug, Error)]
pub enum Error {
    /// The API key was rejected (HTTP 401/403).
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    /// The resource does not exist (HTTP 404).
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Still rate limited after exhausting retries.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Upstream answered with a server error.
    #[error("Dashboard API error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Unexpected client error status other than auth/404/429.
    #[error("Unexpected response (HTTP {status}) from {path}")]
    UnexpectedStatus { status: u16, path: String },

    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL construction failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An id cannot name a single path segment (empty, `.` or `..`).
    #[error("Invalid path segment: {0:?}")]
    InvalidPathSegment(String),

    /// JSON body did not match the expected model.
    #[error("Malformed response from {path}: {message}")]
    Deserialization {
        path: String,
        message: String,
        body: String,
    },

    /// The HTTP client could not be built.
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::AuthFailure,
            Self::NotFound { .. } | Self::InvalidPathSegment(_) => ErrorKind::NotFound,
            Self::Deserialization { .. } | Self::InvalidUrl(_) => ErrorKind::MalformedResponse,
            Self::RateLimited { .. }
            | Self::Server { .. }
            | Self::UnexpectedStatus { .. }
            | Self::Transport(_)
            | Self::Config(_) => ErrorKind::UpstreamTransient,
        }
    }

    /// Returns `true` if the credential was rejected.
    pub fn is_auth_failure(&self) -> bool {
        self.kind() == ErrorKind::AuthFailure
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited { .. } | Self::Server { .. } => true,
            _ => false,
        }
    }
}
