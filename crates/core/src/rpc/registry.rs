//! Method registry (§4.3): a case-insensitive, insertion-ordered mapping
//! from method name to handler. Read-heavy, write-rare — an `IndexMap`
//! behind a `RwLock` gives the concurrent-map correctness §5/§9 asks for
//! without pulling in a dedicated lock-free map crate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::rpc::envelope::is_valid_method_name;
use crate::state::ServerState;

/// Everything a handler needs beyond its own `params`: the request's
/// origin context (§4.3 "Request env").
pub struct RequestEnv {
    pub state: Arc<ServerState>,
    /// Opaque per-connection/per-request client identifier, used for
    /// rate limiting and logging, not for authorization.
    pub client_id: String,
    /// True iff the client's remote address is loopback.
    pub is_local: bool,
}

pub type HandlerResult = Result<Value, anyhow::Error>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A registered method handler. Returns `(result, error)` per §4.3's
/// handler contract; transport glue turns the `Ok`/`Err` into a JSON-RPC
/// result or application-error object.
pub type Handler = Arc<dyn Fn(RequestEnv, Value) -> HandlerFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    InvalidName,
    Duplicate,
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::InvalidName => "method name must be non-empty and match [a-z.]+",
            Self::Duplicate => "method already registered",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for RegisterError {}

/// The method registry. Registration happens once at startup; lookups
/// happen on every dispatched request, so the hot path only ever takes a
/// shared (read) lock.
#[derive(Default)]
pub struct MethodRegistry {
    handlers: RwLock<IndexMap<String, Handler>>,
}

impl MethodRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a handler under `name`. Names are lowercased; duplicate
    /// registration (post-lowercasing) fails rather than silently
    /// overwriting the earlier handler.
    pub async fn register(&self, name: &str, handler: Handler) -> Result<(), RegisterError> {
        let lower = name.to_ascii_lowercase();
        if !is_valid_method_name(&lower) {
            return Err(RegisterError::InvalidName);
        }
        let mut handlers = self.handlers.write().await;
        if handlers.contains_key(&lower) {
            return Err(RegisterError::Duplicate);
        }
        handlers.insert(lower, handler);
        Ok(())
    }

    /// Case-insensitive lookup.
    pub async fn get(&self, name: &str) -> Option<Handler> {
        let lower = name.to_ascii_lowercase();
        self.handlers.read().await.get(&lower).cloned()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
