//! Integration tests for the Meraki exporter.
//!
//! A wiremock dashboard API sits behind the real router, so every test
//! covers topology resolution, collectors, aggregation and rendering.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use meraki_dashboard::DashboardClient;
use meraki_exporter::config::PeerAggregation;
use meraki_exporter::http::create_router;
use meraki_exporter::{ExporterConfig, ScrapeError, Scraper};

const ORG: &str = "O_1";

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer) -> ExporterConfig {
    let mut config = ExporterConfig::default();
    config.dashboard.base_url = server.uri();
    config.dashboard.max_retries = 1;
    config.dashboard.retry_backoff_ms = 5;
    config.collect.vpn = true;
    config.collect.usage = true;
    config
}

fn scraper(config: &ExporterConfig) -> Arc<Scraper> {
    let transport = config
        .dashboard
        .transport(SecretString::from("test-key".to_string()));
    let client = DashboardClient::new(&transport).unwrap();
    Arc::new(Scraper::new(client, config))
}

async fn get(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Switch usage in kilobytes equal to 1000/600/400 bytes.
fn switch_usage() -> Value {
    json!([{
        "serial": "Q2SW-0001",
        "ports": [
            {
                "portId": "1",
                "intervals": [{
                    "data": { "usage": { "total": 0.9765625, "upstream": 0.5859375, "downstream": 0.390625 } }
                }]
            },
            {
                "portId": "2",
                "intervals": [{
                    "data": { "usage": { "total": 5.0, "upstream": 2.0, "downstream": 3.0 } }
                }]
            }
        ]
    }])
}

/// One network "HQ" with a switch, an access point and an appliance.
async fn mount_organization(server: &MockServer, usage: ResponseTemplate) {
    mount_json(server, "/organizations/O_1/networks", json!([{ "id": "N_1", "name": "HQ" }])).await;
    mount_json(
        server,
        "/networks/N_1/devices",
        json!([
            { "serial": "Q2SW-0001", "name": "SW1", "mac": "00:18:0a:00:00:01", "model": "MS120-8", "networkId": "N_1", "productType": "switch" },
            { "serial": "Q2AP-0001", "name": "AP1", "mac": "00:18:0a:00:00:02", "model": "MR46", "networkId": "N_1", "productType": "wireless" },
            { "serial": "Q2MX-0001", "name": "MX1", "mac": "00:18:0a:00:00:03", "model": "MX68", "networkId": "N_1", "productType": "appliance" }
        ]),
    )
    .await;
    mount_json(server, "/networks/N_1/floorPlans", json!([])).await;

    mount_json(
        server,
        "/organizations/O_1/devices/statuses",
        json!([
            { "serial": "Q2SW-0001", "status": "online" },
            { "serial": "Q2AP-0001", "status": "online" },
            { "serial": "Q2MX-0001", "status": "online", "usingCellularFailover": false }
        ]),
    )
    .await;
    mount_json(
        server,
        "/organizations/O_1/devices/uplinksLossAndLatency",
        json!([{
            "serial": "Q2MX-0001",
            "uplink": "wan1",
            "ip": "8.8.8.8",
            "timeSeries": [{ "lossPercent": 0.0, "latencyMs": 25.0 }]
        }]),
    )
    .await;
    mount_json(
        server,
        "/organizations/O_1/appliance/uplink/statuses",
        json!([{ "serial": "Q2MX-0001", "uplinks": [{ "interface": "wan1", "status": "active" }] }]),
    )
    .await;
    mount_json(
        server,
        "/organizations/O_1/appliance/vpn/statuses",
        json!([{
            "deviceSerial": "Q2MX-0001",
            "vpnMode": "spoke",
            "exportedSubnets": [{ "subnet": "10.0.0.0/24" }],
            "merakiVpnPeers": [{ "networkId": "N_2", "networkName": "Branch", "reachability": "reachable" }],
            "thirdPartyVpnPeers": []
        }]),
    )
    .await;

    mount_json(
        server,
        "/organizations/O_1/switch/ports/bySwitch",
        json!([{
            "serial": "Q2SW-0001",
            "ports": [
                { "portId": "1", "tags": ["uplink"] },
                { "portId": "2", "tags": [] }
            ]
        }]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(
            "/organizations/O_1/switch/ports/usage/history/byDevice/byInterval",
        ))
        .respond_with(usage)
        .mount(server)
        .await;
    mount_json(server, "/devices/Q2SW-0001/switch/ports/statuses", json!([])).await;

    mount_json(
        server,
        "/devices/Q2AP-0001/clients",
        json!([{ "mac": "aa:bb:cc:00:00:01", "usage": { "sent": 1.0, "recv": 2.0 } }]),
    )
    .await;
    mount_json(
        server,
        "/networks/N_1/wireless/usageHistory",
        json!([{ "totalKbps": 30.0, "sentKbps": 10.0, "receivedKbps": 20.0 }]),
    )
    .await;
    mount_json(
        server,
        "/organizations/O_1/wireless/devices/system/cpu/load/history",
        json!([{ "serial": "Q2AP-0001", "series": [{ "cpuLoad5": 12.5 }] }]),
    )
    .await;
    mount_json(
        server,
        "/organizations/O_1/devices/system/memory/usage/history/byInterval",
        json!([]),
    )
    .await;
}

// ── Scrape ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_uplink_port_usage_end_to_end() {
    let server = MockServer::start().await;
    mount_organization(
        &server,
        ResponseTemplate::new(200).set_body_json(switch_usage()),
    )
    .await;
    let router = create_router(scraper(&config(&server)));

    let (status, content_type, body) = get(router, "/?target=O_1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content_type.as_deref(),
        Some("text/plain; version=0.0.4; charset=utf-8")
    );
    let labels = r#"name="SW1",office="HQ",floor="",product_type="switch",serial="Q2SW-0001",portId="1""#;
    assert!(body.contains(&format!("meraki_switch_port_usage_total_bytes{{{labels}}} 1000\n")));
    assert!(body.contains(&format!("meraki_switch_port_usage_upstream_bytes{{{labels}}} 600\n")));
    assert!(body.contains(&format!("meraki_switch_port_usage_downstream_bytes{{{labels}}} 400\n")));
    assert!(!body.contains("portId=\"2\""));
}

#[tokio::test]
async fn test_all_collectors_contribute() {
    let server = MockServer::start().await;
    mount_organization(
        &server,
        ResponseTemplate::new(200).set_body_json(switch_usage()),
    )
    .await;
    let router = create_router(scraper(&config(&server)));

    let (_, _, body) = get(router, "/?target=O_1").await;

    assert!(body.contains(
        "meraki_device_status{name=\"SW1\",office=\"HQ\",floor=\"\",product_type=\"switch\",serial=\"Q2SW-0001\"} 1\n"
    ));
    assert!(body.contains(",serial=\"Q2MX-0001\",uplink=\"wan1\"} 0.025\n"));
    assert!(body.contains("meraki_device_uplink_status{"));
    assert!(body.contains(",serial=\"Q2MX-0001\",subnet=\"10.0.0.0/24\"} 1\n"));
    assert!(body.contains("meraki_vpn_mode{"));
    assert!(body.contains("meraki_vpn_meraki_peers{name=\"MX1\""));
    assert!(body.contains(",serial=\"Q2AP-0001\"} 3072\n"));
    assert!(body.contains("meraki_wireless_client_count{name=\"AP1\""));
    assert!(body.contains("meraki_wireless_ap_cpu_load{name=\"AP1\""));
    assert!(!body.contains("meraki_vpn_third_party_peers"));
    assert!(!body.contains("meraki_wireless_ap_memory_used_percent"));
    assert!(body.contains("\nrequest_processing_seconds "));
}

#[tokio::test]
async fn test_per_peer_vpn_policy() {
    let server = MockServer::start().await;
    mount_organization(
        &server,
        ResponseTemplate::new(200).set_body_json(switch_usage()),
    )
    .await;
    let mut config = config(&server);
    config.collect.vpn_peers = PeerAggregation::PerPeer;
    let router = create_router(scraper(&config));

    let (_, _, body) = get(router, "/?target=O_1").await;

    assert!(body.contains(
        ",serial=\"Q2MX-0001\",peer_network_id=\"N_2\",peer_network_name=\"Branch\",reachability=\"reachable\"} 1\n"
    ));
}

#[tokio::test]
async fn test_disabled_features_are_not_collected() {
    let server = MockServer::start().await;
    mount_organization(
        &server,
        ResponseTemplate::new(200).set_body_json(switch_usage()),
    )
    .await;
    let mut config = config(&server);
    config.collect.vpn = false;
    config.collect.usage = false;
    let router = create_router(scraper(&config));

    let (status, _, body) = get(router, "/?target=O_1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("meraki_device_status{"));
    assert!(!body.contains("meraki_vpn_"));
    assert!(!body.contains("meraki_switch_"));
    assert!(!body.contains("meraki_wireless_"));
}

#[tokio::test]
async fn test_switch_usage_failure_is_partial() {
    let server = MockServer::start().await;
    mount_organization(&server, ResponseTemplate::new(500)).await;
    let router = create_router(scraper(&config(&server)));

    let (status, _, body) = get(router, "/?target=O_1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("meraki_device_status{"));
    assert!(body.contains("meraki_vpn_exported_subnets{"));
    assert!(body.contains("meraki_wireless_client_count{"));
    assert!(!body.contains("meraki_switch_port_"));
}

#[tokio::test]
async fn test_switch_usage_past_deadline_is_partial() {
    let server = MockServer::start().await;
    mount_organization(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(switch_usage())
            .set_delay(Duration::from_secs(5)),
    )
    .await;
    let mut config = config(&server);
    config.scrape.timeout_secs = 1;
    let router = create_router(scraper(&config));

    let started = std::time::Instant::now();
    let (status, _, body) = get(router, "/?target=O_1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(body.contains("meraki_device_status{"));
    assert!(body.contains("meraki_wireless_client_count{"));
    assert!(!body.contains("meraki_switch_port_"));
}

// ── Topology ────────────────────────────────────────────────────────

/// Mount `route` ahead of anything `mount_organization` registers for it.
async fn mount_override(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .with_priority(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_failing_network_is_left_out_of_topology() {
    let server = MockServer::start().await;
    mount_override(
        &server,
        "/organizations/O_1/networks",
        ResponseTemplate::new(200).set_body_json(json!([
            { "id": "N_1", "name": "HQ" },
            { "id": "N_2", "name": "Branch" }
        ])),
    )
    .await;
    mount_override(&server, "/networks/N_2/devices", ResponseTemplate::new(500)).await;
    mount_override(&server, "/networks/N_2/floorPlans", ResponseTemplate::new(500)).await;
    mount_override(
        &server,
        "/organizations/O_1/devices/statuses",
        ResponseTemplate::new(200).set_body_json(json!([
            { "serial": "Q2SW-0001", "status": "online" },
            { "serial": "Q2SW-0002", "status": "online" }
        ])),
    )
    .await;
    mount_organization(
        &server,
        ResponseTemplate::new(200).set_body_json(switch_usage()),
    )
    .await;
    let mut config = config(&server);
    config.collect.vpn = false;
    let router = create_router(scraper(&config));

    let (status, _, body) = get(router, "/?target=O_1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(
        "meraki_device_status{name=\"SW1\",office=\"HQ\",floor=\"\",product_type=\"switch\",serial=\"Q2SW-0001\"} 1\n"
    ));
    assert!(body.contains("meraki_switch_port_usage_total_bytes{"));
    assert!(!body.contains("office=\"Branch\""));
    assert!(!body.contains("Q2SW-0002"));
}

#[tokio::test]
async fn test_network_listing_past_deadline_yields_empty_scrape() {
    let server = MockServer::start().await;
    mount_override(
        &server,
        "/organizations/O_1/networks",
        ResponseTemplate::new(200)
            .set_body_json(json!([{ "id": "N_1", "name": "HQ" }]))
            .set_delay(Duration::from_secs(5)),
    )
    .await;
    mount_organization(
        &server,
        ResponseTemplate::new(200).set_body_json(switch_usage()),
    )
    .await;
    let mut config = config(&server);
    config.scrape.timeout_secs = 1;
    let router = create_router(scraper(&config));

    let started = std::time::Instant::now();
    let (status, _, body) = get(router, "/?target=O_1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!body.contains("meraki_"));
    assert!(body.contains("\nrequest_processing_seconds "));
}

#[tokio::test]
async fn test_target_cannot_reach_another_organization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/organizations/OTHER/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/organizations/x%2F..%2FOTHER/networks"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let scraper = scraper(&config(&server));

    let err = scraper.render("x/../OTHER").await.unwrap_err();
    assert!(matches!(err, ScrapeError::UnknownOrganization(_)));

    let router = create_router(scraper);
    let (status, _, _) = get(router, "/?target=x%2F..%2FOTHER").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repeated_scrapes_render_identically() {
    let server = MockServer::start().await;
    mount_organization(
        &server,
        ResponseTemplate::new(200).set_body_json(switch_usage()),
    )
    .await;
    let scraper = scraper(&config(&server));

    let strip = |text: String| -> String {
        text.lines()
            .filter(|line| !line.starts_with("request_processing_seconds "))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let first = strip(scraper.render(ORG).await.unwrap());
    let second = strip(scraper.render(ORG).await.unwrap());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unknown_organization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/organizations/missing/networks"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let router = create_router(scraper(&config(&server)));

    let (status, _, body) = get(router, "/?target=missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!body.contains("meraki_"));
}

#[tokio::test]
async fn test_rejected_key_fails_scrape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/organizations/O_1/networks"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let router = create_router(scraper(&config(&server)));

    let (status, _, body) = get(router, "/?target=O_1").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!body.contains("request_processing_seconds"));
}

// ── Organizations ───────────────────────────────────────────────────

#[tokio::test]
async fn test_organizations_yaml() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/organizations",
        json!([
            { "id": "549236", "name": "Acme Corp" },
            { "id": "1001", "name": "No API", "api": { "enabled": false } }
        ]),
    )
    .await;
    let router = create_router(scraper(&config(&server)));

    let (status, content_type, body) = get(router, "/organizations").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/yaml; charset=utf-8"));
    let groups: Vec<serde_yaml::Value> = serde_yaml::from_str(&body).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["targets"][0].as_str(), Some("549236"));
    assert_eq!(groups[0]["labels"]["org_name"].as_str(), Some("Acme Corp"));
}

#[tokio::test]
async fn test_organizations_rejected_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/organizations"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let router = create_router(scraper(&config(&server)));

    let (status, _, body) = get(router, "/organizations").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!body.contains("targets"));
}

#[tokio::test]
async fn test_organizations_upstream_outage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/organizations"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let router = create_router(scraper(&config(&server)));

    let (status, _, _) = get(router, "/organizations").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_landing_page_lists_organizations() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/organizations",
        json!([{ "id": "549236", "name": "Acme <Corp>" }]),
    )
    .await;
    let router = create_router(scraper(&config(&server)));

    let (status, content_type, body) = get(router, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap_or_default().starts_with("text/html"));
    assert!(body.contains("<a href=\"/?target=549236\">549236</a>"));
    assert!(body.contains("Acme &lt;Corp&gt;"));
}
