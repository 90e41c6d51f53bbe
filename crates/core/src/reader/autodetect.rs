//! Auto-detect supervisor (§4.2): a ticker loop that polls idle driver
//! probes, opens matched devices, and reconciles the connected-reader set
//! against host state. Modeled on the teacher's
//! `upstream::health::spawn_health_checker` ticker shape: a
//! `tokio::time::interval` with `MissedTickBehavior::Skip`, a
//! `CancellationToken` for shutdown, and a snapshot-then-iterate pattern
//! that never holds a lock across I/O.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::{normalize_driver_id, Scan};
use crate::reader::{ConnectedReader, DriverFactory};
use crate::state::ServerState;

/// Spawn the auto-detector task. Runs until `shutdown` fires; every
/// failure along the way is local and logged, never fatal (§4.2 "Failure
/// semantics").
pub fn spawn(
    factories: Vec<Arc<dyn DriverFactory>>,
    scan_tx: mpsc::Sender<Scan>,
    state: Arc<ServerState>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            tick(&factories, &scan_tx, &state).await;
        }
    });
}

/// One auto-detect tick (§4.2 steps 1-4).
async fn tick(factories: &[Arc<dyn DriverFactory>], scan_tx: &mpsc::Sender<Scan>, state: &ServerState) {
    let connected_snapshot: Vec<String> =
        state.readers.read().await.values().map(|r| r.path.clone()).collect();
    let mut changed = false;

    for factory in factories {
        let meta = factory.metadata();
        if !meta.default_enabled || !meta.default_auto_detect {
            continue;
        }

        let normalized_ids = meta.normalized_ids();
        let exclude = exclusion_list(&connected_snapshot, &normalized_ids, state).await;

        let Some(probed) = factory.detect(&exclude).await else {
            continue;
        };
        let Some((driver, path)) = probed.split_once(':') else {
            tracing::debug!(probed, "malformed auto-detect probe result, skipping");
            continue;
        };

        if connected_snapshot.iter().any(|p| p == path) {
            continue;
        }

        let connect = crate::model::ReaderConnect {
            driver: driver.to_owned(),
            path: path.to_owned(),
            id_source: None,
            extra: serde_json::Value::Null,
        };
        let normalized_key = format!("{}:{}", normalize_driver_id(driver), path);

        match factory.open(connect, scan_tx.clone()).await {
            Ok(reader) if reader.connected() => {
                tracing::info!(driver, path, "auto-detected reader connected");
                state.readers.write().await.insert(
                    path.to_owned(),
                    ConnectedReader { driver_id: driver.to_owned(), path: path.to_owned(), reader },
                );
                state.failed_binds.write().await.remove(&normalized_key);
                changed = true;
            }
            Ok(mut reader) => {
                tracing::warn!(driver, path, "auto-detected reader reported not connected");
                let _ = reader.close().await;
                state.failed_binds.write().await.insert(normalized_key);
            }
            Err(e) => {
                tracing::warn!(driver, path, error = %e, "auto-detect open failed");
                state.failed_binds.write().await.insert(normalized_key);
            }
        }
    }

    if changed {
        let count = state.readers.read().await.len();
        tracing::info!(connected = count, "auto-detector state changed");
    }
}

/// Build the exclusion list for one driver's probe: the full connected-path
/// set, plus any previously-failed `driver:path` entries for this driver's
/// normalized ID aliases (§4.2).
async fn exclusion_list(connected: &[String], normalized_ids: &[String], state: &ServerState) -> Vec<String> {
    let failed = state.failed_binds.read().await;
    let mut exclude: Vec<String> = connected.to_vec();
    exclude.extend(
        failed.iter().filter(|key| normalized_ids.iter().any(|id| key.starts_with(&format!("{id}:")))).cloned(),
    );
    exclude
}

#[cfg(test)]
#[path = "autodetect_tests.rs"]
mod tests;
