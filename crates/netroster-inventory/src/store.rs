//! The inventory store seam shared by every reconciliation pass.

use std::collections::HashMap;

use async_trait::async_trait;
use netroster_core::{DeviceId, InventoryDevice, NetworkSegment, SegmentId};

/// Errors from inventory store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Device {device_id} references unknown segment {segment_id}")]
    UnknownSegment {
        device_id: DeviceId,
        segment_id: SegmentId,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A set of writes committed atomically: all of it lands or none of it does.
///
/// Segments are created if no segment with the same subnet exists yet; an
/// existing segment with that subnet is reused, and devices in the batch that
/// point at the pending segment are re-pointed at the existing one. Devices
/// are upserted by id.
#[derive(Debug, Clone, Default)]
pub struct InventoryBatch {
    pub segments: Vec<NetworkSegment>,
    pub devices: Vec<InventoryDevice>,
}

impl InventoryBatch {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.devices.is_empty()
    }

    /// Queue a segment for creation and return the id devices should use.
    /// A segment already queued for the same subnet wins.
    pub fn add_segment(&mut self, segment: NetworkSegment) -> SegmentId {
        if let Some(queued) = self.segments.iter().find(|s| s.subnet == segment.subnet) {
            return queued.id;
        }
        let id = segment.id;
        self.segments.push(segment);
        id
    }

    /// Queue a device write, replacing an earlier write of the same device.
    pub fn upsert_device(&mut self, device: InventoryDevice) {
        match self.devices.iter_mut().find(|d| d.id == device.id) {
            Some(slot) => *slot = device,
            None => self.devices.push(device),
        }
    }
}

/// Query and atomic-upsert access to the device inventory.
///
/// Implementations must be safe to share between independent passes; each
/// `commit` is atomic on its own but passes are not coordinated with each
/// other (last commit wins).
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>>;

    async fn list_segments(&self) -> Result<Vec<NetworkSegment>>;

    /// Apply a batch atomically.
    async fn commit(&self, batch: InventoryBatch) -> Result<()>;

    /// First device whose hardware address matches, ignoring case.
    async fn find_device_by_hardware_address(
        &self,
        hardware_address: &str,
    ) -> Result<Option<InventoryDevice>> {
        Ok(self
            .list_devices()
            .await?
            .into_iter()
            .find(|d| d.has_hardware_address(hardware_address)))
    }

    /// First device whose display name matches, ignoring case.
    async fn find_device_by_name(&self, name: &str) -> Result<Option<InventoryDevice>> {
        Ok(self
            .list_devices()
            .await?
            .into_iter()
            .find(|d| d.has_name(name)))
    }

    async fn find_device_by_address(&self, address: &str) -> Result<Option<InventoryDevice>> {
        Ok(self
            .list_devices()
            .await?
            .into_iter()
            .find(|d| d.address == address))
    }

    async fn find_segment_by_subnet(&self, subnet: &str) -> Result<Option<NetworkSegment>> {
        Ok(self
            .list_segments()
            .await?
            .into_iter()
            .find(|s| s.subnet == subnet))
    }

    /// Number of devices owned by each segment. Segments without devices
    /// are absent from the map.
    async fn device_counts(&self) -> Result<HashMap<SegmentId, usize>> {
        let mut counts = HashMap::new();
        for device in self.list_devices().await? {
            *counts.entry(device.segment_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_replaces_repeated_device_writes() {
        let segment = NetworkSegment::new("lab", "10.0.0.0/24");
        let mut device = InventoryDevice::new("pc", "10.0.0.5", segment.id);
        let mut batch = InventoryBatch::default();

        batch.upsert_device(device.clone());
        device.address = "10.0.0.9".to_string();
        batch.upsert_device(device);

        assert_eq!(batch.devices.len(), 1);
        assert_eq!(batch.devices[0].address, "10.0.0.9");
    }

    #[test]
    fn batch_keeps_one_segment_per_subnet() {
        let mut batch = InventoryBatch::default();
        let first = batch.add_segment(NetworkSegment::new("10.0.0.0/24", "10.0.0.0/24"));
        let second = batch.add_segment(NetworkSegment::new("again", "10.0.0.0/24"));
        assert_eq!(first, second);
        assert_eq!(batch.segments.len(), 1);
        assert!(!batch.is_empty());
    }
}
