// Dashboard API HTTP client
//
// Wraps `reqwest::Client` with URL construction, the shared permit pool,
// bounded retry with backoff, `Link`-header pagination and typed decoding.
// Endpoint methods live in `endpoints.rs`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{LINK, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::models::ListBody;
use crate::transport::{RetryPolicy, TransportConfig};

/// Upper bound on followed `rel=next` links for a single listing.
const MAX_PAGES: usize = 500;

/// Async client for the dashboard API.
///
/// Cheap to clone: clones share the connection pool and the permit pool, so
/// the concurrency budget is process-wide no matter how many tasks hold a
/// handle.
#[derive(Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    per_page: u32,
}

impl DashboardClient {
    /// Create a client from a [`TransportConfig`].
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let http = config.build_client()?;
        Ok(Self::with_client(http, config))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, config: &TransportConfig) -> Self {
        Self {
            http,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            retry: config.retry,
            per_page: config.per_page,
        }
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Permits currently free in the shared pool.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{segments...}?{query}`.
    ///
    /// Each segment is percent-encoded on its own, so an id always stays one
    /// path segment.
    pub(crate) fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                Error::Config(format!("base URL {} cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty();
            for segment in segments {
                if matches!(*segment, "" | "." | "..") {
                    return Err(Error::InvalidPathSegment(segment.to_string()));
                }
                path.push(segment);
            }
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET a single JSON document.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(segments, query)?;
        let path = url.path().to_string();
        let resp = self.send(url).await?;
        decode(&path, resp).await
    }

    /// GET every page of a paginated listing.
    ///
    /// Pages are chained through the `Link: <...>; rel=next` response header.
    pub(crate) async fn get_list<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut query = query.to_vec();
        query.push(("perPage", self.per_page.to_string()));

        let first = self.url(segments, &query)?;
        let path = first.path().to_string();
        let mut next = Some(first);
        let mut items = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            let resp = self.send(url).await?;
            next = next_link(&resp)?;

            let body: ListBody<T> = decode(&path, resp).await?;
            items.extend(body.into_items());

            if pages >= MAX_PAGES {
                warn!(path = %path, pages, "Pagination limit reached, truncating listing");
                break;
            }
        }

        debug!(path = %path, pages, items = items.len(), "Fetched listing");
        Ok(items)
    }

    /// Send a GET with permit acquisition and bounded retries.
    ///
    /// The permit is held for the duration of one attempt only, so a request
    /// sleeping in backoff does not starve the pool.
    async fn send(&self, url: Url) -> Result<reqwest::Response> {
        let mut attempt = 0;

        loop {
            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|e| Error::Config(format!("permit pool closed: {e}")))?;
                debug!("GET {}", url);
                self.http.get(url.clone()).send().await
            };

            let (err, hint) = match result {
                Ok(resp) => match classify(&url, resp) {
                    Ok(resp) => return Ok(resp),
                    Err(Failure { error, retry_after }) => (error, retry_after),
                },
                Err(e) => (Error::Transport(e), None),
            };

            if !err.is_transient() || attempt >= self.retry.max_retries {
                return Err(err);
            }

            let delay = hint
                .map(|d| d.min(self.retry.max_backoff))
                .unwrap_or_else(|| self.retry.delay(attempt));
            warn!(
                path = url.path(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying dashboard request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// A failed response plus the server's retry hint, if any.
struct Failure {
    error: Error,
    retry_after: Option<Duration>,
}

/// Map an HTTP status onto the error taxonomy.
fn classify(url: &Url, resp: reqwest::Response) -> std::result::Result<reqwest::Response, Failure> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let path = url.path().to_string();
    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("credential rejected")
                .to_string(),
        },
        StatusCode::NOT_FOUND => Error::NotFound { path },
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = retry_after(&resp);
            return Err(Failure {
                error: Error::RateLimited {
                    retry_after_secs: retry_after.map(|d| d.as_secs()).unwrap_or(0),
                },
                retry_after,
            });
        }
        s if s.is_server_error() => Error::Server {
            status: s.as_u16(),
            message: s.canonical_reason().unwrap_or("server error").to_string(),
        },
        s => Error::UnexpectedStatus {
            status: s.as_u16(),
            path,
        },
    };

    Err(Failure {
        error,
        retry_after: None,
    })
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Extract the `rel=next` target from the `Link` header.
fn next_link(resp: &reqwest::Response) -> Result<Option<Url>> {
    let Some(header) = resp.headers().get(LINK).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };

    match parse_next_link(header) {
        Some(target) => Ok(Some(Url::parse(target)?)),
        None => Ok(None),
    }
}

/// Find the `rel=next` URL in a `Link` header value.
pub(crate) fn parse_next_link(header: &str) -> Option<&str> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params.split(';').any(|p| {
            let p = p.trim();
            p == "rel=next" || p == "rel=\"next\""
        });
        if !is_next {
            return None;
        }
        target
            .trim()
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
    })
}

/// Decode a JSON body, keeping the raw text for diagnostics on failure.
async fn decode<T: DeserializeOwned>(path: &str, resp: reqwest::Response) -> Result<T> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        path: path.to_string(),
        message: e.to_string(),
        body,
    })
}
