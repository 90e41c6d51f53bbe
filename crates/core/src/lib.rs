//! Zaparoo Core: the local device-side service that bridges physical
//! token readers to media launchers on a host. This crate implements the
//! four tightly coupled subsystems described in the spec — the JSON-RPC
//! API gateway, the reader manager, the auto-detect supervisor, and the
//! device pairing handshake — and nothing else; concrete reader
//! transports, launcher dispatch, and the static web app are external
//! collaborators reached through thin trait seams.

pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod notify;
pub mod origin;
pub mod pairing;
pub mod reader;
pub mod rpc;
pub mod state;
pub mod static_assets;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::device::DeviceStore;
use crate::reader::DriverFactory;
use crate::rpc::registry::MethodRegistry;
use crate::state::ServerState;

/// One-shot signal fired once the listen socket is bound, before `run`
/// starts serving (§5: "a startup-readiness signal is emitted once the
/// listener is bound").
pub type ReadySignal = tokio::sync::oneshot::Sender<std::net::SocketAddr>;

/// Run the server until `shutdown` fires. Does not return before either
/// the listener is bound (signaled via `ready`, if provided) or bind
/// fails — a context-aware bind so cancellation during startup fails fast
/// rather than hanging (§5).
pub async fn run(
    config: AppConfig,
    shutdown: CancellationToken,
    devices: Arc<dyn DeviceStore>,
    driver_factories: Vec<Arc<dyn DriverFactory>>,
    ready: Option<ReadySignal>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let registry = MethodRegistry::new();
    crate::transport::register_builtin_methods(&registry).await?;

    let (notifier, notify_rx) = crate::notify::channel();
    let sessions = crate::notify::SessionRegistry::new();
    crate::notify::spawn_fanout(notify_rx, Arc::clone(&sessions), shutdown.clone());

    let pairing = crate::pairing::PairingManager::new(
        config.pairing_token_expiry(),
        config.pairing_attempt_limit,
    );
    pairing.spawn_eviction(shutdown.clone());

    let (scan_tx, scan_rx) = mpsc::channel(256);
    let (token_tx, mut token_rx) = mpsc::channel(256);

    let state = Arc::new(ServerState::new(
        config.clone(),
        shutdown.clone(),
        registry,
        notifier,
        pairing,
        devices,
        scan_tx.clone(),
    ));

    crate::reader::manager::spawn(scan_rx, token_tx, Arc::clone(&state), shutdown.clone());
    crate::reader::autodetect::spawn(
        driver_factories,
        scan_tx,
        Arc::clone(&state),
        config.autodetect_interval(),
        shutdown.clone(),
    );

    // The input token queue feeds downstream domain logic (outside this
    // spec's scope, §1). The reference binary just drains and logs it so
    // the channel never backs up.
    tokio::spawn(async move {
        while let Some(token) = token_rx.recv().await {
            tracing::debug!(uid = %token.uid, source = %token.source, "token delivered to input queue");
        }
    });

    let router = crate::transport::build_router(Arc::clone(&state), Arc::clone(&sessions));

    let listener = tokio::select! {
        _ = shutdown.cancelled() => {
            anyhow::bail!("shutdown requested before listener bound");
        }
        result = TcpListener::bind(&addr) => result?,
    };
    let bound_addr = listener.local_addr()?;
    tracing::info!(addr = %bound_addr, "zaparoo-core listening");
    if let Some(ready) = ready {
        let _ = ready.send(bound_addr);
    }

    let drain_timeout = config.drain_timeout();
    // Every `/api*` handler extracts `ConnectInfo<SocketAddr>` (the auth+rate-limit
    // gate, `rpc_post`, the streaming `upgrade`); that extractor only resolves
    // against a real TCP connection when the service is built via
    // `into_make_service_with_connect_info`, not a bare `Router`.
    let server = axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    match tokio::time::timeout(drain_timeout + Duration::from_secs(5), server).await {
        Ok(result) => result?,
        Err(_) => tracing::warn!("graceful shutdown exceeded drain window, forcing close"),
    }

    Ok(())
}
