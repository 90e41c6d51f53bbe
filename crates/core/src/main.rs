use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use zaparoo_core::config::AppConfig;
use zaparoo_core::device::InMemoryDeviceStore;
use zaparoo_core::reader::{DriverFactory, NullDriverFactory};

#[tokio::main]
async fn main() {
    let config = AppConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let shutdown = CancellationToken::new();
    let devices = InMemoryDeviceStore::new();

    // Concrete reader transports are out of scope (spec §1); the
    // reference binary ships only the trivial in-memory driver used to
    // exercise the auto-detect supervisor end to end.
    let driver_factories: Vec<std::sync::Arc<dyn DriverFactory>> =
        vec![std::sync::Arc::new(NullDriverFactory::new("simpleserial", "/dev/ttyUSB0"))];

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    if let Err(e) = zaparoo_core::run(config, shutdown, devices, driver_factories, None).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
