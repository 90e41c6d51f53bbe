//! Live-server pairing handshake (spec §4.6, §8: "pairing happy path").

mod support;

#[tokio::test]
async fn pairing_initiate_then_complete_over_real_http() {
    let server = support::spawn_default().await;
    let client = reqwest::Client::new();

    let initiate: serde_json::Value = client
        .post(format!("{}/pair/initiate", server.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let pairing_token = initiate["pairingToken"].as_str().unwrap().to_owned();
    assert!(initiate["expiresIn"].as_u64().unwrap() > 0);

    let response = client
        .post(format!("{}/pair/complete", server.base_url()))
        .json(&serde_json::json!({
            "pairingToken": pairing_token,
            "verifier": "test-verifier",
            "deviceName": "Integration Test Phone",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["deviceID"].as_str().is_some());
    assert!(body["authToken"].as_str().is_some());
    assert_eq!(body["sharedSecret"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn pairing_token_is_single_use() {
    let server = support::spawn_default().await;
    let client = reqwest::Client::new();

    let initiate: serde_json::Value = client
        .post(format!("{}/pair/initiate", server.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let pairing_token = initiate["pairingToken"].as_str().unwrap().to_owned();

    let complete_body = serde_json::json!({
        "pairingToken": pairing_token,
        "verifier": "v",
        "deviceName": "Phone",
    });

    let first = client
        .post(format!("{}/pair/complete", server.base_url()))
        .json(&complete_body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);

    let second = client
        .post(format!("{}/pair/complete", server.base_url()))
        .json(&complete_body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pairing_rejects_unknown_token() {
    let server = support::spawn_default().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/pair/complete", server.base_url()))
        .json(&serde_json::json!({
            "pairingToken": "never-issued",
            "verifier": "v",
            "deviceName": "Phone",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}
