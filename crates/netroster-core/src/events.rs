//! Inventory mutation events.
//!
//! Every change a reconciliation pass makes to the inventory is described
//! by an event, returned alongside the pass outcome and logged by callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DeviceId, DeviceStatus, SegmentId};

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// A change applied to the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub payload: EventPayload,
}

impl InventoryEvent {
    pub fn new(source: EventSource, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            source,
            payload,
        }
    }
}

/// Which reconciliation pass produced the event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// An address-range sweep.
    Sweep,
    /// The paired-device source.
    Companion,
    /// Client records imported from an external list.
    Import,
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    /// A segment was created implicitly.
    SegmentCreated { segment_id: SegmentId, subnet: String },
    /// A known device was observed at a new address.
    DeviceRelocated {
        device_id: DeviceId,
        from_address: String,
        to_address: String,
        segment_id: SegmentId,
    },
    /// A device's display name was refreshed.
    DeviceRenamed { device_id: DeviceId, name: String },
    /// A device was created from an import.
    DeviceImported { device_id: DeviceId, address: String },
    /// A device's status changed.
    StatusChanged {
        device_id: DeviceId,
        status: DeviceStatus,
    },
}
