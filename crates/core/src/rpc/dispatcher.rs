//! Request dispatcher (§4.3): parses envelopes, routes to the method
//! registry, and renders responses. Shared by both transports — the
//! streaming session loop and the POST handler each call [`dispatch`]
//! once per message.

use serde_json::Value;

use crate::rpc::envelope::{classify, Incoming, RpcError, RpcId, RpcResponse};
use crate::rpc::registry::{MethodRegistry, RequestEnv};

/// Method names whose requests must never have their params logged (§4.3
/// "Logging safety"): they carry log-file contents or raw token writes.
const SENSITIVE_METHODS: &[&str] = &["settings.logs.download", "readers.write"];

/// Outcome of dispatching one message.
pub enum DispatchOutcome {
    /// Nothing should be written back (notification or response object).
    NoReply,
    /// A JSON-RPC response must be written back verbatim.
    Reply(Vec<u8>),
}

/// Dispatch one JSON-RPC message (§4.3 steps 1-6).
pub async fn dispatch(
    msg: &[u8],
    registry: &MethodRegistry,
    env: RequestEnv,
) -> DispatchOutcome {
    log_inbound(msg);

    let incoming = match classify(msg) {
        Ok(incoming) => incoming,
        Err(response) => return DispatchOutcome::Reply(response.to_bytes()),
    };

    match incoming {
        Incoming::Response => DispatchOutcome::NoReply,
        Incoming::Notification { method, params } => {
            invoke(registry, &method, params, env).await;
            DispatchOutcome::NoReply
        }
        Incoming::Request { id, method, params } => {
            let response = match registry.get(&method).await {
                None => RpcResponse::error(id, RpcError::method_not_found()),
                Some(handler) => {
                    let result = invoke_handler(handler, env, params).await;
                    match result {
                        Ok(value) => RpcResponse::result(id, value),
                        Err(message) => RpcResponse::error(id, message),
                    }
                }
            };
            DispatchOutcome::Reply(response.to_bytes())
        }
    }
}

/// Notification path: run the handler for side effects, discard/log its
/// outcome. Never produces a reply regardless of success or failure.
async fn invoke(registry: &MethodRegistry, method: &str, params: Value, env: RequestEnv) {
    let Some(handler) = registry.get(method).await else {
        tracing::debug!(method, "notification for unknown method ignored");
        return;
    };
    if let Err(e) = invoke_handler(handler, env, params).await {
        tracing::debug!(method, error = %e.message, "notification handler returned an error");
    }
}

/// Invoke a handler with panic isolation (§4.3, §9 "boundary-level fault
/// isolation"). Tokio tasks that panic fail their `JoinHandle` rather than
/// unwinding into the caller, so spawning is sufficient recovery; we turn
/// that into a `-32603 Internal error` just like an ordinary handler error.
/// The handler also inherits the configured default request timeout (§5
/// "Cancellation & timeouts"): a handler that never resolves is abandoned
/// rather than left to hold up its caller indefinitely, though the spawned
/// task itself keeps running to completion in the background.
async fn invoke_handler(
    handler: crate::rpc::registry::Handler,
    env: RequestEnv,
    params: Value,
) -> Result<Value, RpcError> {
    let timeout = env.state.config.request_timeout();
    let task = tokio::spawn(async move { handler(env, params).await });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(RpcError::application(e.to_string())),
        Ok(Err(join_error)) if join_error.is_panic() => {
            tracing::error!(error = %join_error, "handler panicked");
            Err(RpcError::internal_error())
        }
        Ok(Err(join_error)) => {
            tracing::error!(error = %join_error, "handler task failed to complete");
            Err(RpcError::internal_error())
        }
        Err(_) => {
            tracing::warn!(?timeout, "handler exceeded the default request timeout");
            Err(RpcError::internal_error())
        }
    }
}

/// Truncate a value's rendered JSON to a fixed byte budget before it is
/// written to a debug log, so a large binary-like result (e.g. a log-file
/// download) never blows up log storage (§4.3 "Logging safety").
const LOG_TRUNCATE_BYTES: usize = 2048;

fn truncate_for_log(value: &str) -> String {
    if value.len() <= LOG_TRUNCATE_BYTES {
        return value.to_owned();
    }
    let mut end = LOG_TRUNCATE_BYTES;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &value[..end], value.len())
}

fn log_inbound(msg: &[u8]) {
    let Ok(text) = std::str::from_utf8(msg) else {
        tracing::debug!(bytes = msg.len(), "inbound non-utf8 message");
        return;
    };
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        tracing::debug!(len = text.len(), "inbound unparsable message");
        return;
    };
    let method = value.get("method").and_then(Value::as_str).unwrap_or("");
    if SENSITIVE_METHODS.contains(&method) {
        tracing::debug!(method, "inbound rpc message (params redacted)");
        return;
    }
    tracing::debug!(method, body = %truncate_for_log(text), "inbound rpc message");
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
