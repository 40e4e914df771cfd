//! Neighbor cache snapshot: address to hardware address.
//!
//! Read once per sweep, after probing. The kernel table is preferred; when it
//! is missing (non-Linux hosts) the output of `arp -a` is parsed instead. Both
//! the Windows and the BSD/net-tools layouts are understood.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

pub type NeighborMap = HashMap<IpAddr, String>;

#[async_trait]
pub trait NeighborTable: Send + Sync {
    /// A snapshot of the cache. Failures yield an empty map.
    async fn snapshot(&self) -> NeighborMap;
}

pub struct SystemNeighborTable {
    table_path: PathBuf,
    arp_path: String,
}

impl SystemNeighborTable {
    pub fn new(table_path: impl Into<PathBuf>, arp_path: &str) -> Self {
        Self {
            table_path: table_path.into(),
            arp_path: arp_path.to_string(),
        }
    }

    async fn from_arp_command(&self) -> std::io::Result<NeighborMap> {
        let output = Command::new(&self.arp_path)
            .arg("-a")
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(parse_arp_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl NeighborTable for SystemNeighborTable {
    async fn snapshot(&self) -> NeighborMap {
        match tokio::fs::read_to_string(&self.table_path).await {
            Ok(text) => return parse_proc_arp(&text),
            Err(e) => tracing::debug!(
                path = %self.table_path.display(),
                error = %e,
                "Kernel neighbor table unavailable, falling back to arp"
            ),
        }

        match self.from_arp_command().await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(arp_path = %self.arp_path, error = %e, "Neighbor table unreadable");
                NeighborMap::new()
            }
        }
    }
}

/// Parse `/proc/net/arp`.
pub fn parse_proc_arp(text: &str) -> NeighborMap {
    let mut map = NeighborMap::new();
    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let (Ok(addr), Some(mac)) = (fields[0].parse::<IpAddr>(), parse_mac(fields[3])) else {
            continue;
        };
        map.insert(addr, mac);
    }
    map
}

/// Parse `arp -a` output in either layout:
///
/// ```text
///   192.168.1.1           aa-bb-cc-dd-ee-ff     dynamic
/// ? (192.168.1.1) at aa:bb:cc:dd:ee:ff on en0 ifscope [ethernet]
/// ```
pub fn parse_arp_output(text: &str) -> NeighborMap {
    let mut map = NeighborMap::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();

        let entry = if let Some(at) = fields.iter().position(|f| *f == "at") {
            // BSD / net-tools: "<name> (<ip>) at <mac> ..."
            let addr = at
                .checked_sub(1)
                .and_then(|i| fields.get(i))
                .map(|f| f.trim_start_matches('(').trim_end_matches(')'))
                .and_then(|f| f.parse::<IpAddr>().ok());
            let mac = fields.get(at + 1).and_then(|f| parse_mac(f));
            addr.zip(mac)
        } else if fields.len() >= 3 {
            // Windows: "<ip> <mac> <type>"
            let addr = fields[0].parse::<IpAddr>().ok();
            let mac = parse_mac(fields[1]);
            addr.zip(mac)
        } else {
            None
        };

        if let Some((addr, mac)) = entry {
            map.insert(addr, mac);
        }
    }
    map
}

/// Normalise a MAC to `AA:BB:CC:DD:EE:FF`. Single-digit octets (BSD) are
/// padded; malformed and all-zero (incomplete) entries are rejected.
pub fn parse_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.split([':', '-']).collect();
    if octets.len() != 6 {
        return None;
    }

    let mut normalized = Vec::with_capacity(6);
    for octet in octets {
        if octet.is_empty() || octet.len() > 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        normalized.push(format!("{:0>2}", octet.to_ascii_uppercase()));
    }

    if normalized.iter().all(|o| o == "00") {
        return None;
    }
    Some(normalized.join(":"))
}
