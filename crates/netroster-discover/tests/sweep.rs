//! End-to-end sweep behaviour against scripted collaborators and an
//! in-memory inventory.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use netroster_core::{InterfaceInfo, InventoryDevice, NetworkSegment};
use netroster_discover::interfaces::InterfaceSource;
use netroster_discover::neighbor::{NeighborMap, NeighborTable};
use netroster_discover::probe::{ProbeSettings, Prober};
use netroster_discover::resolve::NameResolver;
use netroster_discover::vendor::VendorLookup;
use netroster_discover::{Collaborators, DiscoverError, Sweeper};
use netroster_inventory::{Inventory, InventoryBatch, InventoryStore, MemoryStore, StoreError};

// ── Scripted collaborators ───────────────────────────────────────

/// Answers for the listed addresses. Lower last octets finish later, so
/// completion order is the reverse of address order.
struct ScriptedProber {
    live: Vec<IpAddr>,
    calls: AtomicUsize,
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, addr: IpAddr) -> std::io::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let IpAddr::V4(v4) = addr {
            let delay = 255u64.saturating_sub(u64::from(v4.octets()[3]));
            tokio::time::sleep(Duration::from_micros(delay * 50)).await;
        }
        Ok(self.live.contains(&addr))
    }
}

struct FixedNeighbors(NeighborMap);

#[async_trait]
impl NeighborTable for FixedNeighbors {
    async fn snapshot(&self) -> NeighborMap {
        self.0.clone()
    }
}

struct FixedNames(HashMap<IpAddr, String>);

#[async_trait]
impl NameResolver for FixedNames {
    async fn reverse(&self, addr: IpAddr) -> Option<String> {
        self.0.get(&addr).cloned()
    }
}

struct FixedVendors;

impl VendorLookup for FixedVendors {
    fn vendor(&self, hardware_address: &str) -> Option<String> {
        hardware_address
            .starts_with("AA:BB:CC")
            .then(|| "Acme Networks".to_string())
    }
}

struct FixedInterfaces(Vec<InterfaceInfo>);

#[async_trait]
impl InterfaceSource for FixedInterfaces {
    async fn list_interfaces(&self) -> Vec<InterfaceInfo> {
        self.0.clone()
    }
}

/// Reads from an in-memory inventory but refuses every commit.
struct RefusingStore(MemoryStore);

#[async_trait]
impl InventoryStore for RefusingStore {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>, StoreError> {
        self.0.list_devices().await
    }

    async fn list_segments(&self) -> Result<Vec<NetworkSegment>, StoreError> {
        self.0.list_segments().await
    }

    async fn commit(&self, _batch: InventoryBatch) -> Result<(), StoreError> {
        Err(StoreError::Connection("inventory unreachable".to_string()))
    }
}

#[derive(Default)]
struct Lab {
    live: Vec<&'static str>,
    macs: Vec<(&'static str, &'static str)>,
    names: Vec<(&'static str, &'static str)>,
    interfaces: Vec<InterfaceInfo>,
}

impl Lab {
    fn build(self, store: Arc<dyn InventoryStore>) -> (Sweeper, Arc<ScriptedProber>) {
        let prober = Arc::new(ScriptedProber {
            live: self.live.iter().map(|s| ip(s)).collect(),
            calls: AtomicUsize::new(0),
        });
        let collaborators = Collaborators {
            prober: prober.clone(),
            neighbors: Arc::new(FixedNeighbors(
                self.macs.iter().map(|(a, m)| (ip(a), m.to_string())).collect(),
            )),
            resolver: Arc::new(FixedNames(
                self.names.iter().map(|(a, n)| (ip(a), n.to_string())).collect(),
            )),
            vendors: Arc::new(FixedVendors),
            interfaces: Arc::new(FixedInterfaces(self.interfaces)),
        };
        let settings = ProbeSettings {
            max_concurrent: 8,
            timeout: Duration::from_millis(500),
        };
        (Sweeper::new(collaborators, store, settings), prober)
    }
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn seeded(segment: NetworkSegment, devices: Vec<InventoryDevice>) -> MemoryStore {
    MemoryStore::with_inventory(Inventory {
        segments: vec![segment],
        devices,
    })
}

// ── Range validation ─────────────────────────────────────────────

#[tokio::test]
async fn oversized_range_is_rejected_before_probing() {
    let (sweeper, prober) = Lab {
        live: vec!["10.0.0.1"],
        ..Default::default()
    }
    .build(Arc::new(MemoryStore::new()));

    let err = sweeper.probe_range("10.0.0.0/21").await.unwrap_err();
    assert!(matches!(err, DiscoverError::InvalidRange { .. }));
    assert_eq!(prober.calls.load(Ordering::SeqCst), 0);

    let err = sweeper.probe_range("garbage").await.unwrap_err();
    assert!(matches!(err, DiscoverError::InvalidRange { .. }));
    assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn results_stay_inside_range_and_skip_network_and_broadcast() {
    let (sweeper, prober) = Lab {
        // .0 and .255 answer too, but are never probed.
        live: vec!["192.168.5.0", "192.168.5.1", "192.168.5.254", "192.168.5.255"],
        ..Default::default()
    }
    .build(Arc::new(MemoryStore::new()));

    let report = sweeper.probe_range("192.168.5.0/24").await.unwrap();
    let addrs: Vec<&str> = report.results.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(addrs, vec!["192.168.5.1", "192.168.5.254"]);
    assert_eq!(prober.calls.load(Ordering::SeqCst), 254);
}

// ── Ordering and output de-duplication ───────────────────────────

#[tokio::test]
async fn output_is_ascending_regardless_of_completion_order() {
    let (sweeper, _) = Lab {
        live: vec!["10.0.0.200", "10.0.0.3", "10.0.0.77", "10.0.0.12"],
        ..Default::default()
    }
    .build(Arc::new(MemoryStore::new()));

    let report = sweeper.probe_range("10.0.0.0/24").await.unwrap();
    let addrs: Vec<Ipv4Addr> = report
        .results
        .iter()
        .map(|r| r.address.parse().unwrap())
        .collect();
    let mut sorted = addrs.clone();
    sorted.sort();
    assert_eq!(addrs, sorted);
    assert_eq!(addrs.len(), 4);
}

#[tokio::test]
async fn duplicate_name_reported_once_but_both_reconciled() {
    let segment = NetworkSegment::new("lab", "10.0.0.0/24");
    // Two adapters of one machine, each recorded as its own device.
    let mut laptop = InventoryDevice::new("laptop", "10.0.0.40", segment.id);
    laptop.hardware_address = Some("AA:BB:CC:00:00:01".into());
    let mut dock = InventoryDevice::new("dock-nic", "10.0.0.41", segment.id);
    dock.hardware_address = Some("AA:BB:CC:00:00:02".into());
    let store = Arc::new(seeded(segment, vec![laptop.clone(), dock.clone()]));

    let (sweeper, _) = Lab {
        live: vec!["10.0.0.20", "10.0.0.21"],
        macs: vec![
            ("10.0.0.20", "AA:BB:CC:00:00:01"),
            ("10.0.0.21", "AA:BB:CC:00:00:02"),
        ],
        names: vec![
            ("10.0.0.20", "workstation.corp.example"),
            ("10.0.0.21", "workstation.corp.example"),
        ],
        ..Default::default()
    }
    .build(store.clone());

    let report = sweeper.probe_range("10.0.0.0/24").await.unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].address, "10.0.0.20");
    assert_eq!(report.results[0].resolved_name, "workstation");
    assert_eq!(report.results[0].vendor.as_deref(), Some("Acme Networks"));

    // The suppressed host still relocated its own device.
    assert_eq!(report.summary.relocated, 2);
    let snapshot = store.snapshot().await;
    let addr_of = |id| {
        snapshot
            .devices
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.address.clone())
            .unwrap()
    };
    assert_eq!(addr_of(laptop.id), "10.0.0.20");
    assert_eq!(addr_of(dock.id), "10.0.0.21");
}

// ── Identity merge ───────────────────────────────────────────────

#[tokio::test]
async fn hardware_address_relocates_without_duplicating() {
    let segment = NetworkSegment::new("10.0.0.0/24", "10.0.0.0/24");
    let mut device = InventoryDevice::new("nas", "10.0.0.5", segment.id);
    device.hardware_address = Some("AA:BB:CC:DD:EE:01".into());
    let store = Arc::new(seeded(segment.clone(), vec![device.clone()]));

    let (sweeper, _) = Lab {
        live: vec!["10.0.0.9"],
        macs: vec![("10.0.0.9", "AA:BB:CC:DD:EE:01")],
        ..Default::default()
    }
    .build(store.clone());

    let report = sweeper.probe_range("10.0.0.0/24").await.unwrap();
    assert!(report.results[0].already_known);

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.devices.len(), 1);
    assert_eq!(snapshot.segments.len(), 1);
    assert_eq!(snapshot.devices[0].id, device.id);
    assert_eq!(snapshot.devices[0].address, "10.0.0.9");
    assert_eq!(snapshot.devices[0].segment_id, segment.id);
    // A fallback name never overwrites the recorded one.
    assert_eq!(snapshot.devices[0].name, "nas");
}

#[tokio::test]
async fn unmatched_hosts_are_reported_but_never_created() {
    let store = Arc::new(MemoryStore::new());
    let (sweeper, _) = Lab {
        live: vec!["10.9.0.7"],
        names: vec![("10.9.0.7", "stranger")],
        ..Default::default()
    }
    .build(store.clone());

    let report = sweeper.probe_range("10.9.0.0/24").await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(!report.results[0].already_known);
    assert!(report.events.is_empty());

    let snapshot = store.snapshot().await;
    assert!(snapshot.devices.is_empty());
    assert!(snapshot.segments.is_empty());
}

#[tokio::test]
async fn consecutive_identical_sweeps_are_idempotent() {
    let home = NetworkSegment::new("office", "192.168.1.0/24");
    // One machine, known by name, answering on two adapters in a new range.
    let device = InventoryDevice::new("buildbox", "192.168.1.30", home.id);
    let store = Arc::new(seeded(home, vec![device]));

    let lab = || Lab {
        live: vec!["10.0.0.5", "10.0.0.9"],
        names: vec![("10.0.0.5", "buildbox"), ("10.0.0.9", "buildbox.lan")],
        ..Default::default()
    };

    let (sweeper, _) = lab().build(store.clone());
    let first = sweeper.probe_range("10.0.0.0/24").await.unwrap();
    assert_eq!(first.summary.relocated, 1);
    assert!(first.summary.segment_created);
    let after_first = store.snapshot().await;
    assert_eq!(after_first.devices[0].address, "10.0.0.5");

    let (sweeper, _) = lab().build(store.clone());
    let second = sweeper.probe_range("10.0.0.0/24").await.unwrap();
    assert_eq!(second.summary.relocated, 0);
    assert!(second.events.is_empty());
    assert_eq!(store.snapshot().await, after_first);
    assert_eq!(after_first.devices.len(), 1);
    assert_eq!(after_first.segments.len(), 2);
}

#[tokio::test]
async fn already_known_by_name_crosses_segments() {
    // The device lives in an unrelated segment; a same-named host in the
    // swept range is still flagged as known.
    let elsewhere = NetworkSegment::new("branch", "172.16.0.0/24");
    let device = InventoryDevice::new("printer", "172.16.0.20", elsewhere.id);
    let store = Arc::new(seeded(elsewhere, vec![device]));

    let (sweeper, _) = Lab {
        live: vec!["10.0.0.20"],
        names: vec![("10.0.0.20", "PRINTER.corp")],
        ..Default::default()
    }
    .build(store.clone());

    let report = sweeper.probe_range("10.0.0.0/24").await.unwrap();
    assert!(report.results[0].already_known);
}

// ── Scenario ─────────────────────────────────────────────────────

#[tokio::test]
async fn slash_30_single_responder_without_enrichment() {
    let (sweeper, prober) = Lab {
        live: vec!["192.168.1.2"],
        ..Default::default()
    }
    .build(Arc::new(MemoryStore::new()));

    let report = sweeper.probe_range("192.168.1.0/30").await.unwrap();
    assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.results.len(), 1);

    let json = serde_json::to_value(&report.results[0]).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "address": "192.168.1.2",
            "resolvedName": "192.168.1.2",
            "hardwareAddress": null,
            "vendor": null,
            "alreadyKnown": false,
        })
    );
}

#[tokio::test]
async fn gateway_and_local_roles_annotated() {
    let (sweeper, _) = Lab {
        live: vec!["192.168.1.1", "192.168.1.10", "192.168.1.50"],
        interfaces: vec![InterfaceInfo {
            address: "192.168.1.10".parse().unwrap(),
            cidr: "192.168.1.0/24".to_string(),
            adapter_label: "Intel Ethernet".to_string(),
            gateway: Some("192.168.1.1".parse().unwrap()),
            hardware_address: None,
        }],
        ..Default::default()
    }
    .build(Arc::new(MemoryStore::new()));

    let report = sweeper.probe_range("192.168.1.0/24").await.unwrap();
    let roles: Vec<Option<&str>> = report.results.iter().map(|r| r.role.as_deref()).collect();
    assert_eq!(roles, vec![Some("gateway"), Some("local"), None]);
}

// ── Store failures ───────────────────────────────────────────────

#[tokio::test]
async fn commit_failure_aborts_sweep_without_writes() {
    let home = NetworkSegment::new("office", "192.168.1.0/24");
    let mut nas = InventoryDevice::new("nas", "192.168.1.20", home.id);
    nas.hardware_address = Some("AA:BB:CC:00:00:20".to_string());
    let inner = seeded(home, vec![nas]);
    let before = inner.snapshot().await;
    let store = Arc::new(RefusingStore(inner));

    let (sweeper, _) = Lab {
        live: vec!["10.0.0.9"],
        macs: vec![("10.0.0.9", "AA:BB:CC:00:00:20")],
        names: vec![("10.0.0.9", "nas")],
        ..Default::default()
    }
    .build(store.clone());

    let err = sweeper.probe_range("10.0.0.0/24").await.unwrap_err();
    assert!(matches!(err, DiscoverError::Store(StoreError::Connection(_))));
    assert_eq!(store.0.snapshot().await, before);
}
