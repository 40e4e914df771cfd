//! netroster-core: Shared types and events for the netroster inventory.
//!
//! This crate provides the foundational types used across all netroster components:
//! - Segment and device records of the inventory
//! - Discovery shapes (discovered hosts, scan results, interfaces)
//! - Companion (paired-device) records
//! - Inventory mutation events

pub mod events;
pub mod types;

pub use events::{EventPayload, EventSource, InventoryEvent};
pub use types::{
    normalize_hardware_address, CompanionKind, CompanionRecord, ConnectionState, DeviceId,
    DeviceStatus, DiscoveredHost, InterfaceInfo, InventoryDevice, NetworkSegment, ScanResult,
    SegmentId, COMPANION_ADDRESS_PREFIX, COMPANION_SEGMENT_NAME, COMPANION_SUBNET,
};
