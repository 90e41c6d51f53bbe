//! JSON-RPC 2.0 envelope types and reserved error codes (§3, §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parse error: the payload was not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Invalid request: valid JSON but not a conforming envelope.
pub const INVALID_REQUEST: i64 = -32600;
/// Method not found: no handler registered under that name.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid params: reserved for handlers that want to reject their `params`.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal error: an uncaught panic inside a handler was recovered.
pub const INTERNAL_ERROR: i64 = -32603;
/// Application error fallback code, until a richer taxonomy is adopted (§9).
pub const APPLICATION_ERROR: i64 = 1;

/// A JSON-RPC request id. Three variants per spec §3: *absent* (the message
/// is a notification and must not be replied to), *null*, or a concrete
/// string/integer value. Absent and null are distinct on the wire — only
/// the former suppresses the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcId {
    Absent,
    Null,
    Str(String),
    Num(i64),
}

impl RpcId {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Render as the JSON value that belongs in a response's `id` field.
    /// Never called on `Absent` — notifications never produce a response.
    fn to_value(&self) -> Value {
        match self {
            Self::Absent | Self::Null => Value::Null,
            Self::Str(s) => Value::String(s.clone()),
            Self::Num(n) => Value::Number((*n).into()),
        }
    }

    fn from_value(value: Option<&Value>) -> Self {
        match value {
            None => Self::Absent,
            Some(Value::Null) => Self::Null,
            Some(Value::String(s)) => Self::Str(s.clone()),
            Some(Value::Number(n)) => Self::Num(n.as_i64().unwrap_or(0)),
            Some(_) => Self::Null,
        }
    }
}

/// A decoded JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn internal_error() -> Self {
        Self::new(INTERNAL_ERROR, "Internal error")
    }

    /// A handler's returned `anyhow::Error` becomes an application error
    /// object with a fixed code, per §4.3's handler contract. A richer
    /// per-kind taxonomy is an open, forward-compatible improvement (§9).
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(APPLICATION_ERROR, message.into())
    }
}

/// A fully-rendered JSON-RPC response (success or error), ready to
/// serialize onto the wire.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub id: RpcId,
    pub outcome: RpcOutcome,
}

#[derive(Debug, Clone)]
pub enum RpcOutcome {
    Result(Value),
    Error(RpcError),
}

impl RpcResponse {
    pub fn result(id: RpcId, value: Value) -> Self {
        Self { id, outcome: RpcOutcome::Result(value) }
    }

    pub fn error(id: RpcId, error: RpcError) -> Self {
        Self { id, outcome: RpcOutcome::Error(error) }
    }

    /// Serialize to the wire envelope `{"jsonrpc":"2.0","id":...,"result"|"error":...}`.
    pub fn to_value(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("jsonrpc".into(), Value::String("2.0".into()));
        obj.insert("id".into(), self.id.to_value());
        match &self.outcome {
            RpcOutcome::Result(v) => {
                obj.insert("result".into(), v.clone());
            }
            RpcOutcome::Error(e) => {
                obj.insert(
                    "error".into(),
                    serde_json::json!({ "code": e.code, "message": e.message }),
                );
            }
        }
        Value::Object(obj)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.to_value()).unwrap_or_else(|_| b"{}".to_vec())
    }
}

/// A decoded incoming JSON-RPC envelope, post-classification (§4.3 steps 1-6).
#[derive(Debug, Clone)]
pub enum Incoming {
    /// `method` present, id absent: must not be replied to.
    Notification { method: String, params: Value },
    /// `method` present, id present (possibly null): must be replied to.
    Request { id: RpcId, method: String, params: Value },
    /// Looked like a response object (`result`/`error`, no `method`):
    /// consumed silently, never replied to.
    Response,
}

/// Classify a raw message per §4.3. Returns `Err(RpcResponse)` when the
/// envelope itself is malformed and a parse/invalid-request error must be
/// sent back immediately; `Ok(Incoming)` otherwise.
pub fn classify(msg: &[u8]) -> Result<Incoming, RpcResponse> {
    let value: Value =
        serde_json::from_slice(msg).map_err(|_| RpcResponse::error(RpcId::Null, RpcError::parse_error()))?;

    let Some(obj) = value.as_object() else {
        return Err(RpcResponse::error(RpcId::Null, RpcError::invalid_request()));
    };

    let jsonrpc_ok = obj.get("jsonrpc").and_then(Value::as_str) == Some("2.0");
    let method = obj.get("method").and_then(Value::as_str).filter(|m| !m.is_empty());
    let params = obj.get("params").cloned().unwrap_or(Value::Null);

    if let Some(method) = method {
        let id = RpcId::from_value(obj.get("id"));
        if !jsonrpc_ok {
            // Respond with whatever id we could parse; absent stays absent
            // only if the caller truly omitted it, matching §4.3 step 2.
            let reply_id = if id.is_absent() { RpcId::Null } else { id };
            return Err(RpcResponse::error(reply_id, RpcError::invalid_request()));
        }
        return Ok(if id.is_absent() {
            Incoming::Notification { method: method.to_owned(), params }
        } else {
            Incoming::Request { id, method: method.to_owned(), params }
        });
    }

    // No method: either a response object (consume silently) or garbage.
    if jsonrpc_ok || obj.contains_key("result") || obj.contains_key("error") {
        return Ok(Incoming::Response);
    }

    Err(RpcResponse::error(RpcId::Null, RpcError::invalid_request()))
}

/// Method-name charset per §3: non-empty, `[a-z.]+` after lowercasing.
pub fn is_valid_method_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '.')
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
