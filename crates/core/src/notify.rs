//! Notification fan-out (§4.4): a single task consumes one notifications
//! channel in FIFO order and broadcasts each event to every open streaming
//! session, writing to each session **before** reading the next
//! notification. A `broadcast` channel would let a slow or lagging
//! receiver reorder or drop events relative to others; an explicit
//! per-session `mpsc` fan-out list preserves the total order the spec's
//! paired `media.started`/`media.stopped` sequences depend on (§8).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// A server-initiated JSON-RPC notification, pre-serialization.
#[derive(Debug, Clone)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self { method: method.into(), params }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let envelope = serde_json::json!({
            "jsonrpc": "2.0",
            "method": self.method,
            "params": self.params,
        });
        serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{}".to_vec())
    }
}

/// Handle used by producers (request handlers, the reader manager, etc.)
/// to enqueue a notification. Cheap to clone; backed by an unbounded
/// channel so producers never block on a slow fan-out task.
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationSender {
    pub fn send(&self, notification: Notification) {
        // The only way this fails is the fan-out task having already shut
        // down (e.g. during drain); dropping the notification is correct
        // at that point, there is nowhere left to deliver it.
        let _ = self.tx.send(notification);
    }
}

/// The set of currently open streaming sessions, keyed by an opaque id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, mpsc::Sender<Vec<u8>>>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a newly-opened streaming session's outbound channel.
    /// Returns the session id, used later to deregister on disconnect.
    pub async fn insert(&self, tx: mpsc::Sender<Vec<u8>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().await.insert(id, tx);
        id
    }

    pub async fn remove(&self, id: u64) {
        self.sessions.write().await.remove(&id);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Build a fresh notification channel plus the session registry the
/// fan-out task broadcasts to. Returns the producer-facing sender and the
/// receiver the fan-out task owns.
pub fn channel() -> (NotificationSender, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSender { tx }, rx)
}

/// Spawn the single fan-out task (§4.4, §5). Terminates on cancellation or
/// when the channel closes (all senders dropped).
pub fn spawn_fanout(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    sessions: Arc<SessionRegistry>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let notification = tokio::select! {
                _ = shutdown.cancelled() => break,
                notification = rx.recv() => match notification {
                    Some(n) => n,
                    None => break,
                },
            };
            broadcast_one(&sessions, &notification, SESSION_WRITE_TIMEOUT).await;
        }
    });
}

/// A session whose outbound channel is still full after this long is
/// dropped rather than left to stall delivery to every other session
/// (§9 Open Questions: "timeout per-session write and drop the session on
/// timeout").
const SESSION_WRITE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Write one notification to every currently-open session, synchronously,
/// before the fan-out task reads the next one. A single session's write
/// failure (full/closed channel, or a send that doesn't clear within
/// `write_timeout`) is logged, the session is dropped, and delivery to the
/// rest is not aborted (§4.4).
async fn broadcast_one(sessions: &SessionRegistry, notification: &Notification, write_timeout: std::time::Duration) {
    let bytes = notification.to_bytes();
    let snapshot: Vec<(u64, mpsc::Sender<Vec<u8>>)> =
        sessions.sessions.read().await.iter().map(|(id, tx)| (*id, tx.clone())).collect();

    for (id, tx) in snapshot {
        match tokio::time::timeout(write_timeout, tx.send(bytes.clone())).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                tracing::debug!(session_id = id, method = %notification.method, "session write failed during fan-out");
                sessions.remove(id).await;
            }
            Err(_) => {
                tracing::warn!(
                    session_id = id,
                    method = %notification.method,
                    "session write timed out during fan-out, dropping session"
                );
                sessions.remove(id).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
