//! Sweep orchestration: range → probes → barrier → neighbor and name
//! resolution → identity reconciliation → ordered results.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use netroster_core::{DiscoveredHost, EventSource, InventoryEvent, ScanResult};
use netroster_inventory::InventoryStore;

use crate::config::DiscoverConfig;
use crate::error::Result;
use crate::interfaces::{InterfaceSource, LocalRoles, SystemInterfaces};
use crate::merge::{self, MergeSummary};
use crate::neighbor::{NeighborTable, SystemNeighborTable};
use crate::probe::{self, PingProber, ProbeSettings, Prober};
use crate::range::SweepRange;
use crate::resolve::{self, DnsResolver, NameResolver};
use crate::vendor::{OuiVendorLookup, VendorLookup};

/// The OS-facing capabilities a sweep consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub prober: Arc<dyn Prober>,
    pub neighbors: Arc<dyn NeighborTable>,
    pub resolver: Arc<dyn NameResolver>,
    pub vendors: Arc<dyn VendorLookup>,
    pub interfaces: Arc<dyn InterfaceSource>,
}

impl Collaborators {
    /// Real system collaborators configured from `config`.
    pub fn system(config: &DiscoverConfig) -> Self {
        Self {
            prober: Arc::new(PingProber::new(&config.ping_path, config.probe_timeout())),
            neighbors: Arc::new(SystemNeighborTable::new(
                &config.neighbor_table_path,
                &config.arp_path,
            )),
            resolver: Arc::new(DnsResolver::new(config.resolve_timeout())),
            vendors: Arc::new(OuiVendorLookup),
            interfaces: Arc::new(SystemInterfaces::new(&config.route_table_path)),
        }
    }
}

/// Everything one sweep produced.
#[derive(Debug)]
pub struct SweepReport {
    pub range: String,
    pub results: Vec<ScanResult>,
    pub events: Vec<InventoryEvent>,
    pub summary: MergeSummary,
    pub duration: Duration,
}

/// Runs sweeps against a shared inventory.
#[derive(Clone)]
pub struct Sweeper {
    collaborators: Collaborators,
    store: Arc<dyn InventoryStore>,
    settings: ProbeSettings,
}

impl Sweeper {
    pub fn new(
        collaborators: Collaborators,
        store: Arc<dyn InventoryStore>,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            collaborators,
            store,
            settings,
        }
    }

    pub fn from_config(config: &DiscoverConfig, store: Arc<dyn InventoryStore>) -> Self {
        let settings = ProbeSettings {
            max_concurrent: config.max_concurrent_probes,
            timeout: config.probe_timeout(),
        };
        Self::new(Collaborators::system(config), store, settings)
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Sweep a range and reconcile what answered with the inventory.
    ///
    /// An invalid range fails before any probe is sent. Probe, neighbor and
    /// name failures only leave gaps in the data. Store failures abort the
    /// sweep without partial writes.
    pub async fn probe_range(&self, raw_range: &str) -> Result<SweepReport> {
        let range = SweepRange::parse(raw_range)?;
        let start = Instant::now();

        tracing::info!(
            range = %range,
            candidates = range.host_count(),
            "Starting sweep"
        );

        let live =
            probe::probe_all(self.collaborators.prober.clone(), range.hosts(), self.settings)
                .await;

        // Every probe has finished; the neighbor cache now reflects them.
        let neighbors = self.collaborators.neighbors.snapshot().await;
        let interfaces = self.collaborators.interfaces.list_interfaces().await;
        let roles = LocalRoles::from_interfaces(&interfaces);

        let mut hosts = Vec::with_capacity(live.len());
        for addr in live {
            let addr = IpAddr::V4(addr);
            let name = resolve::short_name(self.collaborators.resolver.as_ref(), addr).await;
            let mut host = DiscoveredHost::new(addr, name);
            host.hardware_address = neighbors.get(&addr).cloned();
            host.vendor = host
                .hardware_address
                .as_deref()
                .and_then(|hw| self.collaborators.vendors.vendor(hw));
            host.role = roles.role_of(&addr);
            hosts.push(host);
        }

        let outcome =
            merge::reconcile(self.store.as_ref(), &range.cidr(), hosts, EventSource::Sweep)
                .await?;
        let duration = start.elapsed();

        tracing::info!(
            range = %range,
            live = outcome.summary.live,
            reported = outcome.summary.reported,
            known = outcome.summary.known,
            relocated = outcome.summary.relocated,
            duration_ms = duration.as_millis(),
            "Sweep complete"
        );

        Ok(SweepReport {
            range: range.cidr(),
            results: outcome.results.iter().map(ScanResult::from).collect(),
            events: outcome.events,
            summary: outcome.summary,
            duration,
        })
    }
}
