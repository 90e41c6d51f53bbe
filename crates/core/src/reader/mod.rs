//! Reader driver capability set and connected-reader bookkeeping (§9
//! Design Notes: "duck-typed reader and platform"). Concrete transport
//! protocols (serial framing, blkid, MQTT) are out of scope (spec §1); this
//! module defines only the trait seam real drivers would implement, plus a
//! trivial in-memory driver used by tests and the reference binary.

pub mod autodetect;
pub mod manager;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::{DriverMetadata, ReaderConnect, Scan};

/// One open reader instance. Implementations may be removable hardware;
/// `connected()` must reflect a hotplug loss promptly so the auto-detector
/// can reconcile its `connected` set.
#[async_trait]
pub trait Reader: Send + Sync {
    fn path(&self) -> &str;
    fn connected(&self) -> bool;
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// A driver type's capability set (§9): metadata, a probe for
/// auto-detection, and an opener that wires a new instance into the shared
/// scan channel. Implementations are selected by driver-ID lookup; the set
/// of implementations is open (plugin-like) but compiled in, per spec §1.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    fn metadata(&self) -> DriverMetadata;

    /// Probe for an unclaimed device, excluding any path already in
    /// `exclude` (normalized `driver:path` strings, §4.2). Returns
    /// `driver:path` on a hit, `None` if nothing new was found.
    async fn detect(&self, exclude: &[String]) -> Option<String>;

    /// Open a reader instance per `connect`, wiring its scans into
    /// `scan_tx`. The returned `Reader` is owned by the auto-detector (or
    /// by static startup configuration) until closed.
    async fn open(
        &self,
        connect: ReaderConnect,
        scan_tx: mpsc::Sender<Scan>,
    ) -> anyhow::Result<Box<dyn Reader>>;
}

/// A driver instance currently bound to a path, tracked in host state
/// (§4.2's "connected" set) so the auto-detector and request handlers
/// (e.g. `readers`) can see what's live.
pub struct ConnectedReader {
    pub driver_id: String,
    pub path: String,
    pub reader: Box<dyn Reader>,
}

/// A trivial driver used by tests and as a template for real
/// implementations. Its `detect` always reports one fixed device path
/// unless that path is excluded, and `open` always succeeds.
pub struct NullDriverFactory {
    pub id: &'static str,
    pub fixed_path: &'static str,
    pub default_enabled: bool,
    pub default_auto_detect: bool,
}

impl NullDriverFactory {
    pub fn new(id: &'static str, fixed_path: &'static str) -> Self {
        Self { id, fixed_path, default_enabled: true, default_auto_detect: true }
    }
}

struct NullReader {
    path: String,
    connected: bool,
}

#[async_trait]
impl Reader for NullReader {
    fn path(&self) -> &str {
        &self.path
    }

    fn connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.connected = false;
        Ok(())
    }
}

#[async_trait]
impl DriverFactory for NullDriverFactory {
    fn metadata(&self) -> DriverMetadata {
        DriverMetadata {
            id: self.id.to_owned(),
            description: format!("{} (null driver)", self.id),
            default_enabled: self.default_enabled,
            default_auto_detect: self.default_auto_detect,
            aliases: Vec::new(),
        }
    }

    async fn detect(&self, exclude: &[String]) -> Option<String> {
        let candidate = format!("{}:{}", self.id, self.fixed_path);
        if exclude.iter().any(|e| e == &candidate) {
            None
        } else {
            Some(candidate)
        }
    }

    async fn open(
        &self,
        connect: ReaderConnect,
        _scan_tx: mpsc::Sender<Scan>,
    ) -> anyhow::Result<Box<dyn Reader>> {
        Ok(Box::new(NullReader { path: connect.path, connected: true }))
    }
}
