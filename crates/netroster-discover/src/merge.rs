//! Identity reconciliation: match live hosts against the inventory and
//! relocate known devices that moved.
//!
//! Matching priority per host (first match wins):
//! 1. recorded hardware address (case-insensitive),
//! 2. display name (case-insensitive), only for a really resolved name,
//! 3. recorded primary address.
//!
//! Each device is claimed by at most one host per pass. The strongest signal
//! wins the claim and ties go to the lowest address, so a machine seen on
//! several adapters settles on one address and stays there on later passes.
//! All relocations of a pass land in one atomic batch.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use netroster_core::{
    DeviceId, DiscoveredHost, EventPayload, EventSource, InventoryDevice, InventoryEvent,
    NetworkSegment, SegmentId,
};
use netroster_inventory::{InventoryBatch, InventoryStore};

use crate::error::Result;
use crate::range::same_network;

/// Which signal tied a host to an inventory device. Lower is stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchSignal {
    HardwareAddress,
    Name,
    Address,
}

/// The outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Reported hosts, ascending by address, name duplicates removed.
    pub results: Vec<DiscoveredHost>,
    pub events: Vec<InventoryEvent>,
    pub summary: MergeSummary,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub live: usize,
    pub reported: usize,
    pub known: usize,
    pub relocated: usize,
    pub segment_created: bool,
}

struct Candidate {
    host: DiscoveredHost,
    matched: Option<(InventoryDevice, MatchSignal)>,
}

/// Find the device a host refers to, honouring the matching priority.
pub async fn match_host(
    store: &dyn InventoryStore,
    host: &DiscoveredHost,
) -> Result<Option<(InventoryDevice, MatchSignal)>> {
    if let Some(hw) = &host.hardware_address {
        if let Some(device) = store.find_device_by_hardware_address(hw).await? {
            return Ok(Some((device, MatchSignal::HardwareAddress)));
        }
    }
    if !host.has_fallback_name() {
        if let Some(device) = store.find_device_by_name(&host.resolved_name).await? {
            return Ok(Some((device, MatchSignal::Name)));
        }
    }
    Ok(store
        .find_device_by_address(&host.address.to_string())
        .await?
        .map(|device| (device, MatchSignal::Address)))
}

/// Reconcile live hosts observed in `subnet` with the inventory.
///
/// Hosts that match nothing are reported but never added. Store failures
/// propagate and nothing is written in that case.
pub async fn reconcile(
    store: &dyn InventoryStore,
    subnet: &str,
    mut hosts: Vec<DiscoveredHost>,
    source: EventSource,
) -> Result<MergeOutcome> {
    hosts.sort_by_key(|h| h.address);

    let mut candidates = Vec::with_capacity(hosts.len());
    for host in hosts {
        let matched = match_host(store, &host).await?;
        candidates.push(Candidate { host, matched });
    }

    // Decide claims before touching anything. Hosts are sorted, so keeping
    // the first of equally strong matches gives the lowest address.
    let mut claims: HashMap<DeviceId, (usize, MatchSignal)> = HashMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        if let Some((device, signal)) = &candidate.matched {
            claims
                .entry(device.id)
                .and_modify(|claim| {
                    if *signal < claim.1 {
                        *claim = (idx, *signal);
                    }
                })
                .or_insert((idx, *signal));
        }
    }

    let mut outcome = MergeOutcome::default();
    let mut batch = InventoryBatch::default();
    let mut target_segment: Option<SegmentId> = None;
    let mut seen_names: HashSet<String> = HashSet::new();

    for (idx, candidate) in candidates.into_iter().enumerate() {
        let Candidate { mut host, matched } = candidate;
        outcome.summary.live += 1;
        host.already_known = matched.is_some();

        if let Some((mut device, _)) = matched {
            outcome.summary.known += 1;
            let claimed = claims.get(&device.id).is_some_and(|(winner, _)| *winner == idx);
            let observed = host.address.to_string();

            if claimed && device.address != observed {
                let segment_id = match target_segment {
                    Some(id) => id,
                    None => {
                        let id = segment_for(store, subnet, &mut batch, &mut outcome, source)
                            .await?;
                        target_segment = Some(id);
                        id
                    }
                };
                relocate(&mut device, &host, segment_id, &mut outcome, source);
                batch.upsert_device(device);
                outcome.summary.relocated += 1;
            }
        }

        // One physical machine seen on several adapters is reported once.
        if !host.has_fallback_name() && !seen_names.insert(host.resolved_name.to_lowercase()) {
            tracing::debug!(
                address = %host.address,
                name = %host.resolved_name,
                "Duplicate name in pass, not reported"
            );
            continue;
        }
        outcome.results.push(host);
    }

    outcome.summary.reported = outcome.results.len();

    if !batch.is_empty() {
        store.commit(batch).await?;
        for event in &outcome.events {
            tracing::info!(
                event_id = %event.id.0,
                source = ?event.source,
                payload = ?event.payload,
                "Inventory updated"
            );
        }
    }

    Ok(outcome)
}

/// The segment for `subnet`, queued for creation when the inventory has no
/// segment for the same network.
async fn segment_for(
    store: &dyn InventoryStore,
    subnet: &str,
    batch: &mut InventoryBatch,
    outcome: &mut MergeOutcome,
    source: EventSource,
) -> Result<SegmentId> {
    if let Some(existing) = store.find_segment_by_subnet(subnet).await? {
        return Ok(existing.id);
    }
    // The operator may have declared the network with host bits set.
    if let Some(existing) = store
        .list_segments()
        .await?
        .into_iter()
        .find(|s| same_network(&s.subnet, subnet))
    {
        return Ok(existing.id);
    }
    let id = batch.add_segment(NetworkSegment::new(subnet, subnet));
    outcome.summary.segment_created = true;
    outcome.events.push(InventoryEvent::new(
        source,
        EventPayload::SegmentCreated {
            segment_id: id,
            subnet: subnet.to_string(),
        },
    ));
    Ok(id)
}

fn relocate(
    device: &mut InventoryDevice,
    host: &DiscoveredHost,
    segment_id: SegmentId,
    outcome: &mut MergeOutcome,
    source: EventSource,
) {
    let from_address = std::mem::replace(&mut device.address, host.address.to_string());

    if !host.has_fallback_name() && device.name != host.resolved_name {
        device.name = host.resolved_name.clone();
        outcome.events.push(InventoryEvent::new(
            source,
            EventPayload::DeviceRenamed {
                device_id: device.id,
                name: device.name.clone(),
            },
        ));
    }
    if device.hardware_address.is_none() {
        device.hardware_address = host.hardware_address.clone();
    }
    device.segment_id = segment_id;
    device.updated_at = Utc::now();

    outcome.events.push(InventoryEvent::new(
        source,
        EventPayload::DeviceRelocated {
            device_id: device.id,
            from_address,
            to_address: device.address.clone(),
            segment_id,
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use netroster_inventory::{Inventory, MemoryStore};
    use std::net::IpAddr;

    fn host(addr: &str, name: Option<&str>, hw: Option<&str>) -> DiscoveredHost {
        let ip: IpAddr = addr.parse().unwrap();
        let mut host = DiscoveredHost::new(ip, name.unwrap_or(addr));
        host.hardware_address = hw.map(str::to_string);
        host
    }

    fn store_with(devices: Vec<InventoryDevice>, segment: NetworkSegment) -> MemoryStore {
        MemoryStore::with_inventory(Inventory {
            segments: vec![segment],
            devices,
        })
    }

    #[tokio::test]
    async fn test_hardware_address_beats_name_and_address() {
        let segment = NetworkSegment::new("lab", "10.0.0.0/24");
        let mut by_hw = InventoryDevice::new("nas", "10.0.0.50", segment.id);
        by_hw.hardware_address = Some("AA:BB:CC:DD:EE:01".into());
        let by_name = InventoryDevice::new("printer", "10.0.0.60", segment.id);
        let by_addr = InventoryDevice::new("other", "10.0.0.7", segment.id);
        let store = store_with(vec![by_hw.clone(), by_name, by_addr], segment);

        let probe = host("10.0.0.7", Some("printer"), Some("aa:bb:cc:dd:ee:01"));
        let (device, signal) = match_host(&store, &probe).await.unwrap().unwrap();
        assert_eq!(device.id, by_hw.id);
        assert_eq!(signal, MatchSignal::HardwareAddress);
    }

    #[tokio::test]
    async fn test_fallback_name_never_matches_by_name() {
        let segment = NetworkSegment::new("lab", "10.0.0.0/24");
        // A device whose recorded name happens to be an address.
        let odd = InventoryDevice::new("10.0.0.8", "10.0.0.99", segment.id);
        let store = store_with(vec![odd], segment);

        let probe = host("10.0.0.8", None, None);
        assert!(match_host(&store, &probe).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_relocation_means_no_write() {
        let segment = NetworkSegment::new("lab", "10.0.0.0/24");
        let device = InventoryDevice::new("web-01", "10.0.0.5", segment.id);
        let store = store_with(vec![device], segment);
        let before = store.snapshot().await;

        let outcome = reconcile(
            &store,
            "10.0.0.0/24",
            vec![host("10.0.0.5", Some("web-01"), None)],
            EventSource::Sweep,
        )
        .await
        .unwrap();

        assert_eq!(outcome.summary.relocated, 0);
        assert!(outcome.events.is_empty());
        assert!(outcome.results[0].already_known);
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_relocation_creates_segment_and_renames() {
        let home = NetworkSegment::new("office", "192.168.1.0/24");
        let mut device = InventoryDevice::new("old-name", "192.168.1.20", home.id);
        device.hardware_address = Some("AA:BB:CC:DD:EE:02".into());
        let store = store_with(vec![device.clone()], home);

        let outcome = reconcile(
            &store,
            "10.0.0.0/24",
            vec![host("10.0.0.9", Some("laptop"), Some("AA:BB:CC:DD:EE:02"))],
            EventSource::Sweep,
        )
        .await
        .unwrap();

        assert!(outcome.summary.segment_created);
        assert_eq!(outcome.events.len(), 3);

        let snapshot = store.snapshot().await;
        let created = snapshot
            .segments
            .iter()
            .find(|s| s.subnet == "10.0.0.0/24")
            .unwrap();
        assert_eq!(created.name, "10.0.0.0/24");
        let moved = &snapshot.devices[0];
        assert_eq!(moved.id, device.id);
        assert_eq!(moved.address, "10.0.0.9");
        assert_eq!(moved.name, "laptop");
        assert_eq!(moved.segment_id, created.id);
    }

    #[tokio::test]
    async fn test_hardware_address_backfilled() {
        let segment = NetworkSegment::new("lab", "10.0.0.0/24");
        let device = InventoryDevice::new("cam", "10.0.0.30", segment.id);
        let store = store_with(vec![device], segment);

        reconcile(
            &store,
            "10.0.0.0/24",
            vec![host("10.0.0.31", Some("cam"), Some("10:20:30:40:50:60"))],
            EventSource::Sweep,
        )
        .await
        .unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(
            snapshot.devices[0].hardware_address.as_deref(),
            Some("10:20:30:40:50:60")
        );
        assert_eq!(snapshot.devices[0].address, "10.0.0.31");
    }

    #[tokio::test]
    async fn test_weaker_match_loses_claim() {
        // The device is at .5; .5 still answers by address, but its hardware
        // address shows up at .9. The hardware match wins the claim.
        let segment = NetworkSegment::new("lab", "10.0.0.0/24");
        let mut device = InventoryDevice::new("nas", "10.0.0.5", segment.id);
        device.hardware_address = Some("AA:BB:CC:DD:EE:01".into());
        let store = store_with(vec![device], segment);

        let outcome = reconcile(
            &store,
            "10.0.0.0/24",
            vec![
                host("10.0.0.5", None, None),
                host("10.0.0.9", None, Some("AA:BB:CC:DD:EE:01")),
            ],
            EventSource::Sweep,
        )
        .await
        .unwrap();

        assert_eq!(outcome.summary.relocated, 1);
        assert_eq!(store.snapshot().await.devices[0].address, "10.0.0.9");
    }

    #[tokio::test]
    async fn test_relocation_reuses_segment_declared_with_host_bits() {
        let declared = NetworkSegment::new("office", "10.0.0.1/24");
        let away = NetworkSegment::new("lab", "192.168.1.0/24");
        let mut device = InventoryDevice::new("nas", "192.168.1.5", away.id);
        device.hardware_address = Some("AA:BB:CC:DD:EE:03".into());
        let store = MemoryStore::with_inventory(Inventory {
            segments: vec![declared.clone(), away],
            devices: vec![device],
        });

        let outcome = reconcile(
            &store,
            "10.0.0.0/24",
            vec![host("10.0.0.9", None, Some("AA:BB:CC:DD:EE:03"))],
            EventSource::Sweep,
        )
        .await
        .unwrap();

        assert!(!outcome.summary.segment_created);
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.segments.len(), 2);
        assert_eq!(snapshot.devices[0].segment_id, declared.id);
    }
}
