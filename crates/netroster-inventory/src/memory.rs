//! In-process inventory: the snapshot type shared by the memory and file
//! backends, and the memory-backed store itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use netroster_core::{InventoryDevice, NetworkSegment, SegmentId};

use crate::store::{InventoryBatch, InventoryStore, Result, StoreError};

/// A full inventory snapshot: every segment and every device.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    pub segments: Vec<NetworkSegment>,
    pub devices: Vec<InventoryDevice>,
}

impl Inventory {
    /// Apply a batch all-or-nothing. On error `self` is left untouched.
    pub fn apply(&mut self, batch: InventoryBatch) -> Result<()> {
        let mut next = self.clone();
        let mut remap: HashMap<SegmentId, SegmentId> = HashMap::new();

        for segment in batch.segments {
            if next.segments.iter().any(|s| s.id == segment.id) {
                continue;
            }
            let existing = next
                .segments
                .iter()
                .find(|s| s.subnet == segment.subnet)
                .map(|s| s.id);
            match existing {
                Some(existing) => {
                    remap.insert(segment.id, existing);
                }
                None => next.segments.push(segment),
            }
        }

        for mut device in batch.devices {
            if let Some(existing) = remap.get(&device.segment_id) {
                device.segment_id = *existing;
            }
            if !next.segments.iter().any(|s| s.id == device.segment_id) {
                return Err(StoreError::UnknownSegment {
                    device_id: device.id,
                    segment_id: device.segment_id,
                });
            }
            match next.devices.iter_mut().find(|d| d.id == device.id) {
                Some(slot) => *slot = device,
                None => next.devices.push(device),
            }
        }

        *self = next;
        Ok(())
    }
}

/// Memory-backed store. Clone is cheap (inner Arc); clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inventory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(inventory: Inventory) -> Self {
        Self {
            inner: Arc::new(RwLock::new(inventory)),
        }
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> Inventory {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>> {
        Ok(self.inner.read().await.devices.clone())
    }

    async fn list_segments(&self) -> Result<Vec<NetworkSegment>> {
        Ok(self.inner.read().await.segments.clone())
    }

    async fn commit(&self, batch: InventoryBatch) -> Result<()> {
        let mut inventory = self.inner.write().await;
        inventory.apply(batch)?;
        tracing::debug!(
            segments = inventory.segments.len(),
            devices = inventory.devices.len(),
            "Inventory batch committed"
        );
        Ok(())
    }
}
