//! Shared harness for spinning up a real `zaparoo-core` server on a loopback
//! TCP port, for the end-to-end scenarios that need live HTTP/WS rather than
//! an in-process router (spec §8's "live server" cases).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use zaparoo_core::config::AppConfig;
use zaparoo_core::device::InMemoryDeviceStore;
use zaparoo_core::reader::{DriverFactory, NullDriverFactory};

pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl RunningServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

fn base_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        auth_token: None,
        allowed_origins: Vec::new(),
        mdns_hostname: None,
        request_timeout_secs: 30,
        drain_timeout_secs: 5,
        rate_limit_rps: 1000,
        rate_limit_burst: 1000,
        pairing_token_expiry_secs: 300,
        pairing_attempt_limit: 10,
        autodetect_interval_ms: 50,
        dev: false,
    }
}

/// Spawn a live server with the given config override, returning its bound
/// address and a shutdown handle. Rate limits are set generously so e2e
/// tests aren't flaky under CI load; tests that specifically exercise
/// rate-limiting override `config` themselves.
pub async fn spawn(config: AppConfig) -> RunningServer {
    let shutdown = CancellationToken::new();
    let devices = InMemoryDeviceStore::new();
    let driver_factories: Vec<Arc<dyn DriverFactory>> =
        vec![Arc::new(NullDriverFactory::new("simpleserial", "/dev/ttyUSB0"))];
    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(async move {
        zaparoo_core::run(config, shutdown_clone, devices, driver_factories, Some(ready_tx)).await
    });

    let addr = tokio::time::timeout(std::time::Duration::from_secs(5), ready_rx)
        .await
        .expect("server did not signal readiness in time")
        .expect("server dropped readiness sender before binding");

    RunningServer { addr, shutdown, handle }
}

pub async fn spawn_default() -> RunningServer {
    spawn(base_config()).await
}
