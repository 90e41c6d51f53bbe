//! Reader manager (§4.1): fan-in of every driver's scan events into one
//! deduplicated token queue.
//!
//! The reader-error branch is the one non-obvious rule (spec §4.1 "Why"):
//! without it, a USB hotplug reconnect would clear `prevToken`, so
//! re-detecting the same card would fire as a fresh insertion and cause
//! media to stop and restart. Preserving `prevToken` across a reader error
//! makes the re-detection land as an ordinary duplicate instead.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::{Scan, Token};
use crate::state::ServerState;

/// Spawn the single reader-manager task (§4.1, §5: one dedicated consumer
/// of the scan channel). Never fails; terminates when `scan_rx` closes or
/// `shutdown` fires.
pub fn spawn(
    mut scan_rx: mpsc::Receiver<Scan>,
    in_token_queue: mpsc::Sender<Token>,
    state: Arc<ServerState>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut prev_token: Option<Token> = None;
        loop {
            let scan = tokio::select! {
                _ = shutdown.cancelled() => break,
                scan = scan_rx.recv() => match scan {
                    Some(scan) => scan,
                    None => break,
                },
            };
            handle_scan(scan, &mut prev_token, &in_token_queue, &state).await;
        }
    });
}

/// Process a single scan against the current `prev_token`, per the
/// decision table in §4.1.
async fn handle_scan(
    scan: Scan,
    prev_token: &mut Option<Token>,
    in_token_queue: &mpsc::Sender<Token>,
    state: &ServerState,
) {
    if let Some(err) = scan.error {
        tracing::debug!(source = %scan.source, error = %err, "reader scan error");
        return;
    }

    let Some(token) = scan.token else {
        if scan.reader_error {
            // Hardware fault: preserve prev_token so the eventual
            // re-detection of the same card is seen as a duplicate.
            tracing::warn!(source = %scan.source, "reader hardware fault");
        } else {
            // Normal tag removal.
            tracing::debug!(source = %scan.source, "token removed");
            *prev_token = None;
        }
        return;
    };

    if prev_token.as_ref().is_some_and(|p| p.same_identity(&token)) {
        tracing::debug!(source = %scan.source, uid = %token.uid, "duplicate scan suppressed");
        return;
    }

    if let Some(wrote) = state.wrote_token.take().await {
        if wrote.same_identity(&token) {
            tracing::debug!(source = %scan.source, uid = %token.uid, "write-back suppressed");
            return;
        }
        // Not the token we just wrote: put the marker back, it's still
        // pending for a future scan.
        state.wrote_token.set(Some(wrote)).await;
    }

    *prev_token = Some(token.clone());
    if in_token_queue.send(token).await.is_err() {
        tracing::debug!("in_token_queue closed, dropping scan");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
