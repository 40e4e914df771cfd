//! Segment classification: label each declared segment with an operational
//! role by joining it against the live interfaces of this machine.

use std::collections::HashMap;

use serde::Serialize;

use netroster_core::{InterfaceInfo, NetworkSegment, SegmentId, COMPANION_SEGMENT_NAME};
use netroster_inventory::InventoryStore;

use crate::error::Result;
use crate::interfaces::InterfaceSource;
use crate::range::same_network;

/// Adapter-label fragments that mark a hypervisor or container network.
const VIRTUAL_ADAPTER_MARKERS: &[&str] = &[
    "vmware",
    "virtualbox",
    "hyper-v",
    "vethernet",
    "docker",
    "wsl",
    "virtual",
    "vbox",
    "qemu",
    "parallels",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentKind {
    PairedDevice,
    Virtual,
    Primary,
    Historical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Active,
    Inactive,
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentClassification {
    pub segment_id: SegmentId,
    pub name: String,
    pub subnet: String,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub status: SegmentStatus,
    pub adapter: Option<String>,
    pub device_count: usize,
}

/// Classify every segment. Pure: the same inputs always give the same labels.
pub fn classify_segments(
    segments: &[NetworkSegment],
    interfaces: &[InterfaceInfo],
    device_counts: &HashMap<SegmentId, usize>,
) -> Vec<SegmentClassification> {
    segments
        .iter()
        .map(|segment| {
            let device_count = device_counts.get(&segment.id).copied().unwrap_or(0);
            let (kind, status, adapter) = classify_one(segment, interfaces, device_count);
            SegmentClassification {
                segment_id: segment.id,
                name: segment.name.clone(),
                subnet: segment.subnet.clone(),
                kind,
                status,
                adapter,
                device_count,
            }
        })
        .collect()
}

fn classify_one(
    segment: &NetworkSegment,
    interfaces: &[InterfaceInfo],
    device_count: usize,
) -> (SegmentKind, SegmentStatus, Option<String>) {
    if segment.is_companion() {
        let status = if device_count >= 1 {
            SegmentStatus::Active
        } else {
            SegmentStatus::Inactive
        };
        return (
            SegmentKind::PairedDevice,
            status,
            Some(COMPANION_SEGMENT_NAME.to_string()),
        );
    }

    let Some(iface) = interfaces
        .iter()
        .find(|i| same_network(&i.cidr, &segment.subnet))
    else {
        return (SegmentKind::Historical, SegmentStatus::Inactive, None);
    };

    let adapter = Some(iface.adapter_label.clone());
    if is_virtual_adapter(&iface.adapter_label) {
        (SegmentKind::Virtual, SegmentStatus::Virtual, adapter)
    } else if iface.gateway.is_some() {
        (SegmentKind::Primary, SegmentStatus::Active, adapter)
    } else {
        (SegmentKind::Historical, SegmentStatus::Active, adapter)
    }
}

pub fn is_virtual_adapter(label: &str) -> bool {
    let lower = label.to_lowercase();
    VIRTUAL_ADAPTER_MARKERS.iter().any(|m| lower.contains(m))
}

/// Classify the segments currently in the inventory.
pub async fn classify_inventory(
    store: &dyn InventoryStore,
    interfaces: &dyn InterfaceSource,
) -> Result<Vec<SegmentClassification>> {
    let segments = store.list_segments().await?;
    let counts = store.device_counts().await?;
    let live = interfaces.list_interfaces().await;
    Ok(classify_segments(&segments, &live, &counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn iface(cidr: &str, label: &str, gateway: Option<&str>) -> InterfaceInfo {
        let address: IpAddr = cidr.split('/').next().unwrap().parse().unwrap();
        InterfaceInfo {
            address,
            cidr: cidr.to_string(),
            adapter_label: label.to_string(),
            gateway: gateway.map(|g| g.parse().unwrap()),
            hardware_address: None,
        }
    }

    fn classify(
        segment: &NetworkSegment,
        interfaces: &[InterfaceInfo],
        count: usize,
    ) -> SegmentClassification {
        let counts = HashMap::from([(segment.id, count)]);
        classify_segments(std::slice::from_ref(segment), interfaces, &counts).remove(0)
    }

    #[test]
    fn test_virtual_adapter_segment() {
        let segment = NetworkSegment::new("vm net", "192.168.56.0/24");
        let result = classify(
            &segment,
            &[iface("192.168.56.0/24", "VMware Network Adapter", None)],
            0,
        );
        assert_eq!(result.kind, SegmentKind::Virtual);
        assert_eq!(result.status, SegmentStatus::Virtual);
        assert_eq!(result.adapter.as_deref(), Some("VMware Network Adapter"));
    }

    #[test]
    fn test_companion_segment_status_follows_count() {
        let segment = NetworkSegment::companion();
        let empty = classify(&segment, &[], 0);
        assert_eq!(empty.kind, SegmentKind::PairedDevice);
        assert_eq!(empty.status, SegmentStatus::Inactive);
        assert_eq!(empty.adapter.as_deref(), Some("Bluetooth"));

        assert_eq!(classify(&segment, &[], 2).status, SegmentStatus::Active);
    }

    #[test]
    fn test_primary_and_historical() {
        let segment = NetworkSegment::new("office", "192.168.1.0/24");
        let primary = classify(
            &segment,
            &[iface("192.168.1.0/24", "Intel Ethernet", Some("192.168.1.1"))],
            3,
        );
        assert_eq!(primary.kind, SegmentKind::Primary);
        assert_eq!(primary.status, SegmentStatus::Active);

        let no_gateway = classify(&segment, &[iface("192.168.1.0/24", "eth1", None)], 3);
        assert_eq!(no_gateway.kind, SegmentKind::Historical);
        assert_eq!(no_gateway.status, SegmentStatus::Active);

        let offline = classify(&segment, &[iface("10.0.0.0/24", "eth0", None)], 3);
        assert_eq!(offline.kind, SegmentKind::Historical);
        assert_eq!(offline.status, SegmentStatus::Inactive);
        assert_eq!(offline.adapter, None);
    }

    #[test]
    fn test_subnet_compared_canonically() {
        let segment = NetworkSegment::new("office", "192.168.1.0/24");
        let result = classify(
            &segment,
            &[iface("192.168.1.10/24", "eth0", Some("192.168.1.1"))],
            0,
        );
        assert_eq!(result.kind, SegmentKind::Primary);
    }

    #[test]
    fn test_serialized_labels() {
        let segment = NetworkSegment::companion();
        let json = serde_json::to_value(classify(&segment, &[], 0)).unwrap();
        assert_eq!(json["type"], "paired-device");
        assert_eq!(json["status"], "inactive");
        assert_eq!(json["deviceCount"], 0);
    }
}
