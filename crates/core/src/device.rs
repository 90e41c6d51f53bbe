//! External device/user-database interface (§3).
//!
//! The concrete store (schema, migrations, query layer) is out of scope;
//! the core only needs to write a [`Device`] row at the end of a successful
//! pairing and, for the reference binary and tests, read it back.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::Device;

/// The device/user database interface the pairing manager writes through.
#[async_trait::async_trait]
pub trait DeviceStore: Send + Sync {
    async fn insert(&self, device: Device) -> anyhow::Result<()>;
    async fn get(&self, device_id: &str) -> anyhow::Result<Option<Device>>;
}

/// In-memory [`DeviceStore`] used by the reference binary and by tests.
#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, Device>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn insert(&self, device: Device) -> anyhow::Result<()> {
        self.devices.write().await.insert(device.device_id.clone(), device);
        Ok(())
    }

    async fn get(&self, device_id: &str) -> anyhow::Result<Option<Device>> {
        Ok(self.devices.read().await.get(device_id).cloned())
    }
}
