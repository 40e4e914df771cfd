//! Configuration for the netroster discovery engine.

use std::time::Duration;

use serde::Deserialize;

/// Top-level discover configuration.
///
/// Loaded from the `netroster.toml` `[discover]` section or
/// `NETROSTER_DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Path to the ping binary used as the reachability probe.
    #[serde(default = "default_ping_path")]
    pub ping_path: String,

    /// Per-probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Width of the probe worker pool.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Reverse-lookup timeout in milliseconds.
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,

    /// Path to the `arp` binary, used when the kernel table is unavailable.
    #[serde(default = "default_arp_path")]
    pub arp_path: String,

    /// Kernel neighbor table (Linux).
    #[serde(default = "default_neighbor_table_path")]
    pub neighbor_table_path: String,

    /// Kernel routing table used to find default gateways (Linux).
    #[serde(default = "default_route_table_path")]
    pub route_table_path: String,

    /// Program and arguments that print paired devices as PnP JSON.
    #[serde(default = "default_companion_command")]
    pub companion_command: Vec<String>,

    #[serde(default)]
    pub store: StoreConfig,

    /// Per-subnet sweep schedules for daemon mode.
    #[serde(default)]
    pub schedules: Vec<SubnetSchedule>,

    /// Maximum sweeps running at once in daemon mode.
    #[serde(default = "default_max_concurrent_sweeps")]
    pub max_concurrent_sweeps: usize,

    /// Companion status refresh interval in daemon mode. Disabled when unset.
    #[serde(default)]
    pub companion_refresh_secs: Option<u64>,
}

impl DiscoverConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

/// Which inventory backend to use.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
    Neo4j,
}

/// Inventory store selection and connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Inventory file for the `file` backend.
    #[serde(default = "default_store_path")]
    pub path: String,

    #[serde(default = "default_neo4j_uri")]
    pub neo4j_uri: String,

    #[serde(default = "default_neo4j_user")]
    pub neo4j_user: String,

    #[serde(default = "default_neo4j_password")]
    pub neo4j_password: String,
}

/// A subnet with its sweep schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct SubnetSchedule {
    /// CIDR target (e.g., "192.168.1.0/24").
    pub cidr: String,

    /// Sweep interval in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Whether this subnet is swept.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_ping_path() -> String {
    "ping".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    800
}

fn default_max_concurrent_probes() -> usize {
    64
}

fn default_resolve_timeout_ms() -> u64 {
    2000
}

fn default_arp_path() -> String {
    "arp".to_string()
}

fn default_neighbor_table_path() -> String {
    "/proc/net/arp".to_string()
}

fn default_route_table_path() -> String {
    "/proc/net/route".to_string()
}

fn default_companion_command() -> Vec<String> {
    [
        "powershell",
        "-NoProfile",
        "-Command",
        "Get-PnpDevice -Class Bluetooth -ErrorAction SilentlyContinue | \
         Where-Object { $_.InstanceId -match 'BTHENUM' } | \
         Select-Object FriendlyName, Status, InstanceId | \
         ConvertTo-Json -Compress",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_store_path() -> String {
    "./netroster-inventory.json".to_string()
}

fn default_neo4j_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_neo4j_user() -> String {
    "neo4j".to_string()
}

fn default_neo4j_password() -> String {
    "netroster-dev".to_string()
}

fn default_max_concurrent_sweeps() -> usize {
    1
}

fn default_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            neo4j_uri: default_neo4j_uri(),
            neo4j_user: default_neo4j_user(),
            neo4j_password: default_neo4j_password(),
        }
    }
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            ping_path: default_ping_path(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            arp_path: default_arp_path(),
            neighbor_table_path: default_neighbor_table_path(),
            route_table_path: default_route_table_path(),
            companion_command: default_companion_command(),
            store: StoreConfig::default(),
            schedules: Vec::new(),
            max_concurrent_sweeps: default_max_concurrent_sweeps(),
            companion_refresh_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoverConfig::default();
        assert_eq!(config.ping_path, "ping");
        assert_eq!(config.probe_timeout(), Duration::from_millis(800));
        assert_eq!(config.max_concurrent_probes, 64);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.max_concurrent_sweeps, 1);
        assert!(config.companion_refresh_secs.is_none());
        assert_eq!(config.companion_command[0], "powershell");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let json = r#"{
            "max_concurrent_probes": 16,
            "store": { "backend": "memory" },
            "schedules": [{ "cidr": "10.0.0.0/24" }]
        }"#;
        let config: DiscoverConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_concurrent_probes, 16);
        assert_eq!(config.probe_timeout_ms, 800);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.neo4j_user, "neo4j");
        assert_eq!(config.schedules[0].interval_secs, 3600);
        assert!(config.schedules[0].enabled);
    }
}
