use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::rpc::registry::{HandlerFuture, MethodRegistry};
use crate::state::test_support::test_state;

fn env(state: Arc<crate::state::ServerState>) -> RequestEnv {
    RequestEnv { state, client_id: "test".to_owned(), is_local: true }
}

async fn registry_with_echo() -> Arc<MethodRegistry> {
    let registry = MethodRegistry::new();
    registry
        .register(
            "systems",
            Arc::new(|_env, params| Box::pin(async move { Ok(json!({"echo": params})) })),
        )
        .await
        .unwrap();
    registry
        .register(
            "boom",
            Arc::new(|_env, _params| {
                let fut: HandlerFuture = Box::pin(async move { panic!("handler exploded") });
                fut
            }),
        )
        .await
        .unwrap();
    registry
        .register("fails", Arc::new(|_env, _params| Box::pin(async move { anyhow::bail!("nope") })))
        .await
        .unwrap();
    registry
}

#[tokio::test]
async fn notification_produces_no_reply() {
    let registry = registry_with_echo().await;
    let state = test_state();
    let msg = br#"{"jsonrpc":"2.0","method":"systems","params":{}}"#;
    match dispatch(msg, &registry, env(state)).await {
        DispatchOutcome::NoReply => {}
        DispatchOutcome::Reply(_) => panic!("notifications must not reply"),
    }
}

#[tokio::test]
async fn request_gets_exactly_one_reply_with_matching_id() {
    let registry = registry_with_echo().await;
    let state = test_state();
    let msg = br#"{"jsonrpc":"2.0","id":7,"method":"systems","params":{"a":1}}"#;
    match dispatch(msg, &registry, env(state)).await {
        DispatchOutcome::Reply(bytes) => {
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["id"], 7);
            assert_eq!(value["result"]["echo"]["a"], 1);
        }
        DispatchOutcome::NoReply => panic!("requests must reply"),
    }
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let registry = registry_with_echo().await;
    let state = test_state();
    let msg = br#"{"jsonrpc":"2.0","id":7,"method":"no.such","params":{}}"#;
    match dispatch(msg, &registry, env(state)).await {
        DispatchOutcome::Reply(bytes) => {
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["id"], 7);
            assert_eq!(value["error"]["code"], crate::rpc::envelope::METHOD_NOT_FOUND);
        }
        DispatchOutcome::NoReply => panic!("requests must reply"),
    }
}

#[tokio::test]
async fn handler_panic_is_recovered_as_internal_error() {
    let registry = registry_with_echo().await;
    let state = test_state();
    let msg = br#"{"jsonrpc":"2.0","id":1,"method":"boom","params":null}"#;
    match dispatch(msg, &registry, env(state)).await {
        DispatchOutcome::Reply(bytes) => {
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["error"]["code"], crate::rpc::envelope::INTERNAL_ERROR);
        }
        DispatchOutcome::NoReply => panic!("requests must reply"),
    }
}

#[tokio::test]
async fn handler_error_becomes_application_error() {
    let registry = registry_with_echo().await;
    let state = test_state();
    let msg = br#"{"jsonrpc":"2.0","id":1,"method":"fails","params":null}"#;
    match dispatch(msg, &registry, env(state)).await {
        DispatchOutcome::Reply(bytes) => {
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["error"]["code"], crate::rpc::envelope::APPLICATION_ERROR);
        }
        DispatchOutcome::NoReply => panic!("requests must reply"),
    }
}

#[tokio::test]
async fn handler_exceeding_timeout_becomes_internal_error() {
    let registry = MethodRegistry::new();
    registry
        .register(
            "slow",
            Arc::new(|_env, _params| {
                Box::pin(async move {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    Ok(Value::Null)
                })
            }),
        )
        .await
        .unwrap();

    let mut config = crate::config::AppConfig::default();
    config.request_timeout_secs = 0;
    let state = Arc::new(crate::state::ServerState::new(
        config,
        tokio_util::sync::CancellationToken::new(),
        MethodRegistry::new(),
        crate::notify::channel().0,
        crate::pairing::PairingManager::new(std::time::Duration::from_secs(300), 10),
        crate::device::InMemoryDeviceStore::new(),
        tokio::sync::mpsc::channel(1).0,
    ));

    let msg = br#"{"jsonrpc":"2.0","id":1,"method":"slow","params":null}"#;
    match dispatch(msg, &registry, env(state)).await {
        DispatchOutcome::Reply(bytes) => {
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["error"]["code"], crate::rpc::envelope::INTERNAL_ERROR);
        }
        DispatchOutcome::NoReply => panic!("requests must reply"),
    }
}

#[test]
fn truncate_for_log_bounds_large_payloads() {
    let long = "x".repeat(LOG_TRUNCATE_BYTES * 2);
    let truncated = truncate_for_log(&long);
    assert!(truncated.len() < long.len());
    assert!(truncated.contains("bytes total"));
}
