//! Streaming transport (§4.3, §4.4, §6): one duplex WebSocket-like session
//! per client, carrying JSON-RPC requests/responses both ways plus
//! server-initiated notifications fanned out by [`crate::notify`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::notify::SessionRegistry;
use crate::rpc::dispatcher::{dispatch, DispatchOutcome};
use crate::rpc::registry::RequestEnv;
use crate::state::ServerState;

/// `GET /api`, `/api/v0`, `/api/v0.1` — streaming upgrade.
///
/// The `/api*` middleware stack (API-key auth, then rate limiting, §4.5)
/// runs before this handler on every upgrade request just as it does for
/// `POST`, so auth is already enforced before the handshake response is
/// written — satisfying §4.5's "must re-check auth before accepting the
/// upgrade" without a second, separate check.
pub async fn upgrade(
    State(state): State<Arc<ServerState>>,
    State(sessions): State<Arc<SessionRegistry>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state, sessions, addr))
}

/// One streaming session's lifetime: register with the fan-out registry,
/// pump notifications out and client messages through the dispatcher,
/// until the socket closes or the server shuts down.
async fn run_session(socket: WebSocket, state: Arc<ServerState>, sessions: Arc<SessionRegistry>, addr: SocketAddr) {
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(64);
    let session_id = sessions.insert(out_tx).await;
    let (mut ws_tx, mut ws_rx) = socket.split();
    let client_id = addr.to_string();
    let is_local = addr.ip().is_loopback();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            // Notification fan-out -> this session.
            outbound = out_rx.recv() => {
                match outbound {
                    Some(bytes) => {
                        if ws_tx.send(Message::Text(bytes_to_text(bytes))).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Client message -> dispatcher (or heartbeat).
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let text = text.to_string();
                        if text == "ping" {
                            if ws_tx.send(Message::Text("pong".into())).await.is_err() {
                                break;
                            }
                            continue;
                        }
                        if !state.rate_gate.check(addr.ip()) {
                            tracing::debug!(client = %client_id, "streaming message rate limited");
                            continue;
                        }
                        let env = RequestEnv {
                            state: Arc::clone(&state),
                            client_id: client_id.clone(),
                            is_local,
                        };
                        match dispatch(text.as_bytes(), &state.registry, env).await {
                            DispatchOutcome::NoReply => {}
                            DispatchOutcome::Reply(bytes) => {
                                if ws_tx.send(Message::Text(bytes_to_text(bytes))).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(client = %client_id, error = %e, "streaming session read error");
                        break;
                    }
                }
            }
        }
    }

    sessions.remove(session_id).await;
}

fn bytes_to_text(bytes: Vec<u8>) -> axum::extract::ws::Utf8Bytes {
    String::from_utf8(bytes).unwrap_or_default().into()
}
