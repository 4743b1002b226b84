//! HTTP surface: scrape endpoint, target listing and landing page.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::exposition;
use crate::scrape::{ScrapeError, Scraper};
use crate::targets::{self, TargetsError};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    scraper: Arc<Scraper>,
}

#[derive(Debug, Deserialize)]
struct ScrapeParams {
    target: Option<String>,
}

/// Create the HTTP router.
pub fn create_router(scraper: Arc<Scraper>) -> Router {
    let state = AppState { scraper };

    Router::new()
        .route("/", get(scrape_handler))
        .route("/organizations", get(organizations_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for `/`: scrape `target`, or the landing page without one.
async fn scrape_handler(
    State(state): State<AppState>,
    Query(params): Query<ScrapeParams>,
) -> Response {
    let Some(target) = params.target else {
        return landing_page(&state).await;
    };
    let target = target.trim();
    if target.is_empty() {
        return (StatusCode::BAD_REQUEST, "target must not be empty\n").into_response();
    }
    if !is_organization_id(target) {
        return (
            StatusCode::BAD_REQUEST,
            "target must be an organization id ([A-Za-z0-9_-])\n",
        )
            .into_response();
    }

    match state.scraper.render(target).await {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, exposition::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(org_id = target, error = %e, "Scrape failed");
            let status = match e {
                ScrapeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                ScrapeError::UnknownOrganization(_) => StatusCode::NOT_FOUND,
            };
            (status, format!("{e}\n")).into_response()
        }
    }
}

/// Handler for `/organizations`.
async fn organizations_handler(State(state): State<AppState>) -> Response {
    match targets::list_targets(state.scraper.client()).await {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, targets::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            warn!(error = %e, "Organization listing failed");
            let status = match e {
                TargetsError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                TargetsError::Upstream(_) => StatusCode::BAD_GATEWAY,
                TargetsError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, format!("{e}\n")).into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

async fn landing_page(state: &AppState) -> Response {
    let organizations = match state.scraper.client().get_organizations().await {
        Ok(orgs) => orgs,
        Err(e) => {
            warn!(error = %e, "Could not list organizations for the landing page");
            Vec::new()
        }
    };

    let mut rows = String::new();
    for org in organizations.iter().filter(|o| o.api_enabled()) {
        let id = escape_html(&org.id);
        rows.push_str(&format!(
            "<tr><td><a href=\"/?target={id}\">{id}</a></td><td>{}</td></tr>\n",
            escape_html(org.display_name())
        ));
    }

    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Meraki Exporter</title></head>\n<body>\n\
         <h1>Meraki Exporter</h1>\n\
         <p><a href=\"/organizations\">Service discovery targets</a></p>\n\
         <table>\n<tr><th>Organization</th><th>Name</th></tr>\n{rows}</table>\n\
         </body>\n</html>\n"
    ))
    .into_response()
}

/// Organization ids are plain tokens; anything else never reaches the client.
fn is_organization_id(target: &str) -> bool {
    target
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn escape_html(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

/// HTTP server configuration.
pub struct HttpServer {
    scraper: Arc<Scraper>,
    listen_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(scraper: Arc<Scraper>, listen_addr: SocketAddr) -> Self {
        Self {
            scraper,
            listen_addr,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        let router = create_router(self.scraper);

        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;
        info!(addr = %self.listen_addr, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExporterConfig;
    use axum::body::Body;
    use axum::http::Request;
    use meraki_dashboard::{DashboardClient, TransportConfig};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn make_router(base_url: &str) -> Router {
        let mut transport = TransportConfig::new(SecretString::from("key".to_string()));
        transport.base_url = base_url.to_string();
        transport.retry.max_retries = 0;
        let client = DashboardClient::new(&transport).unwrap();
        create_router(Arc::new(Scraper::new(client, &ExporterConfig::default())))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = make_router("http://127.0.0.1:9");

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "healthy\n");
    }

    #[tokio::test]
    async fn test_empty_target_is_rejected() {
        let router = make_router("http://127.0.0.1:9");

        let response = router
            .oneshot(Request::get("/?target=").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_target_with_path_characters_is_rejected() {
        for uri in [
            "/?target=x%2F..%2FOTHER",
            "/?target=..",
            "/?target=549236%3Fip%3D1.1.1.1",
            "/?target=549236%23frag",
        ] {
            let router = make_router("http://127.0.0.1:9");
            let response = router
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[test]
    fn test_is_organization_id() {
        assert!(is_organization_id("549236"));
        assert!(is_organization_id("O_1"));
        assert!(is_organization_id("L-646829496481"));
        assert!(!is_organization_id("x/../OTHER"));
        assert!(!is_organization_id("a b"));
        assert!(!is_organization_id("1%2F2"));
        assert!(!is_organization_id("é"));
    }

    #[tokio::test]
    async fn test_landing_page_survives_upstream_failure() {
        let router = make_router("http://127.0.0.1:9");

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("<h1>Meraki Exporter</h1>"));
        assert!(!body.contains("<td>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(
            escape_html("<b>\"A&B\"</b>"),
            "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;"
        );
    }
}
