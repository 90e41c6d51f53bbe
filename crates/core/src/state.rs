//! Shared server state (§4.1, §4.2, §5, §9).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::device::DeviceStore;
use crate::model::Token;
use crate::notify::NotificationSender;
use crate::pairing::PairingManager;
use crate::reader::ConnectedReader;
use crate::rpc::registry::MethodRegistry;
use crate::static_assets::{LaunchDispatcher, NoopLaunchDispatcher, PlaceholderAssets, StaticAssets};
use crate::transport::auth::RateGate;

/// The "just wrote" token marker (§4.1, §9 Design Notes).
///
/// Write-back suppression: when a handler writes a token to a tag, it
/// records that token here so the reader manager can recognize the scan it
/// is about to produce as an echo rather than a fresh insertion, and
/// suppress it — without leaking the underlying lock to callers.
#[derive(Default)]
pub struct WroteTokenCell(RwLock<Option<Token>>);

impl WroteTokenCell {
    pub async fn set(&self, token: Option<Token>) {
        *self.0.write().await = token;
    }

    /// Atomically read and clear the marker.
    pub async fn take(&self) -> Option<Token> {
        self.0.write().await.take()
    }
}

/// Shared application state, constructed once at startup and handed to
/// every task and request handler via `Arc`.
pub struct ServerState {
    pub config: AppConfig,
    pub shutdown: CancellationToken,
    pub wrote_token: WroteTokenCell,
    pub registry: Arc<MethodRegistry>,
    pub notifier: NotificationSender,
    pub pairing: Arc<PairingManager>,
    pub devices: Arc<dyn DeviceStore>,
    /// Readers currently bound by the auto-detector or by explicit
    /// configuration, keyed by device path. This is the "host state" the
    /// auto-detect supervisor reconciles against (§4.2).
    pub readers: RwLock<HashMap<String, ConnectedReader>>,
    /// Driver IDs that previously failed to open, keyed by
    /// `driver:path` with underscores stripped (§4.2).
    pub failed_binds: RwLock<std::collections::HashSet<String>>,
    /// Synthesized scans enqueued by request handlers (e.g. a manual
    /// "write" completion) are injected here rather than through a real
    /// driver channel.
    pub scan_tx: mpsc::Sender<crate::model::Scan>,
    pub assets: Arc<dyn StaticAssets>,
    pub launch_dispatcher: Arc<dyn LaunchDispatcher>,
    pub origin_validator: crate::origin::OriginValidator,
    /// Per-IP token bucket shared by the `/api*` HTTP middleware and the
    /// streaming session's per-message check (§4.5).
    pub rate_gate: Arc<RateGate>,
}

impl ServerState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        shutdown: CancellationToken,
        registry: Arc<MethodRegistry>,
        notifier: NotificationSender,
        pairing: Arc<PairingManager>,
        devices: Arc<dyn DeviceStore>,
        scan_tx: mpsc::Sender<crate::model::Scan>,
    ) -> Self {
        let origin_validator =
            crate::origin::OriginValidator::new(config.port, config.mdns_hostname.as_deref());
        let rate_gate = RateGate::new(config.rate_limit_rps, config.rate_limit_burst);
        Self {
            config,
            shutdown,
            wrote_token: WroteTokenCell::default(),
            registry,
            notifier,
            pairing,
            devices,
            readers: RwLock::new(HashMap::new()),
            failed_binds: RwLock::new(std::collections::HashSet::new()),
            scan_tx,
            assets: Arc::new(PlaceholderAssets::default()),
            launch_dispatcher: Arc::new(NoopLaunchDispatcher),
            origin_validator,
            rate_gate,
        }
    }

    /// Swap in real `StaticAssets`/`LaunchDispatcher` implementations.
    /// Builder-style since both default to harmless placeholders and most
    /// callers (tests) never need to override them.
    pub fn with_assets(mut self, assets: Arc<dyn StaticAssets>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_launch_dispatcher(mut self, dispatcher: Arc<dyn LaunchDispatcher>) -> Self {
        self.launch_dispatcher = dispatcher;
        self
    }
}
