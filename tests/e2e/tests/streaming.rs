//! Live-server streaming transport (spec §4.3, §4.4, §6, §8): JSON-RPC over
//! a real WebSocket, heartbeat, and two concurrent sessions each getting
//! their own independent request/response stream.

mod support;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(server: &support::RunningServer) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(server.ws_url("/api")).await.unwrap();
    stream
}

async fn recv_json(stream: &mut WsStream) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match msg {
        WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn ping_gets_pong() {
    let server = support::spawn_default().await;
    let mut ws = connect(&server).await;

    ws.send(WsMessage::Text("ping".into())).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(reply, WsMessage::Text("pong".into()));
}

#[tokio::test]
async fn request_over_streaming_transport_gets_a_response() {
    let server = support::spawn_default().await;
    let mut ws = connect(&server).await;

    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "version",
        "params": {},
    });
    ws.send(WsMessage::Text(request.to_string().into())).await.unwrap();

    let response = recv_json(&mut ws).await;
    assert_eq!(response["id"], 1);
    assert!(response["result"]["version"].as_str().is_some());
}

#[tokio::test]
async fn unknown_method_gets_json_rpc_error() {
    let server = support::spawn_default().await;
    let mut ws = connect(&server).await;

    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "no.such.method",
    });
    ws.send(WsMessage::Text(request.to_string().into())).await.unwrap();

    let response = recv_json(&mut ws).await;
    assert_eq!(response["id"], 7);
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn notification_gets_no_reply() {
    let server = support::spawn_default().await;
    let mut ws = connect(&server).await;

    let notification = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "healthcheck",
    });
    ws.send(WsMessage::Text(notification.to_string().into())).await.unwrap();

    // Follow up with a real request; if a reply to the notification had
    // been queued it would arrive first and this assertion would fail.
    let request = serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "healthcheck"});
    ws.send(WsMessage::Text(request.to_string().into())).await.unwrap();
    let response = recv_json(&mut ws).await;
    assert_eq!(response["id"], 2);
    assert_eq!(response["result"], "ok");
}

#[tokio::test]
async fn two_concurrent_sessions_are_independent() {
    let server = support::spawn_default().await;
    let mut a = connect(&server).await;
    let mut b = connect(&server).await;

    a.send(WsMessage::Text(
        serde_json::json!({"jsonrpc": "2.0", "id": "a", "method": "version"}).to_string().into(),
    ))
    .await
    .unwrap();
    b.send(WsMessage::Text(
        serde_json::json!({"jsonrpc": "2.0", "id": "b", "method": "healthcheck"}).to_string().into(),
    ))
    .await
    .unwrap();

    let response_a = recv_json(&mut a).await;
    let response_b = recv_json(&mut b).await;
    assert_eq!(response_a["id"], "a");
    assert_eq!(response_b["id"], "b");
}
