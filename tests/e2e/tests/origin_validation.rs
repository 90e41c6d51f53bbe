//! Live-server origin/CORS enforcement (spec §4.5, §8: "origin validation").

mod support;

use zaparoo_core::config::AppConfig;

fn config_with_dynamic_origin(origin: &str) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        auth_token: None,
        allowed_origins: vec![origin.to_owned()],
        mdns_hostname: None,
        request_timeout_secs: 30,
        drain_timeout_secs: 5,
        rate_limit_rps: 1000,
        rate_limit_burst: 1000,
        pairing_token_expiry_secs: 300,
        pairing_attempt_limit: 10,
        autodetect_interval_ms: 50,
        dev: false,
    }
}

#[tokio::test]
async fn allowed_localhost_origin_gets_cors_header() {
    let server = support::spawn_default().await;
    let client = reqwest::Client::new();
    let origin = format!("http://localhost:{}", server.addr.port());

    let response = client
        .get(format!("{}/health", server.base_url()))
        .header(reqwest::header::ORIGIN, &origin)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap().to_str().unwrap(),
        origin
    );
}

#[tokio::test]
async fn disallowed_origin_is_rejected() {
    let server = support::spawn_default().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", server.base_url()))
        .header(reqwest::header::ORIGIN, "http://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn configured_dynamic_origin_is_allowed() {
    let server = support::spawn(config_with_dynamic_origin("myhost.local")).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", server.base_url()))
        .header(reqwest::header::ORIGIN, "https://myhost.local")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN).is_some());
}

#[tokio::test]
async fn requests_with_no_origin_header_are_unaffected() {
    let server = support::spawn_default().await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/health", server.base_url())).send().await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn preflight_private_network_request_is_acknowledged() {
    let server = support::spawn_default().await;
    let client = reqwest::Client::new();
    let origin = format!("http://localhost:{}", server.addr.port());

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{}/api", server.base_url()))
        .header(reqwest::header::ORIGIN, &origin)
        .header("access-control-request-private-network", "true")
        .header(reqwest::header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(response.headers().get("access-control-allow-private-network").unwrap(), "true");
}
