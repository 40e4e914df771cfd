//! Live interface enumeration for the machine running the sweep.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use pnet::datalink;
use pnet::util::MacAddr;

use netroster_core::InterfaceInfo;

#[async_trait]
pub trait InterfaceSource: Send + Sync {
    async fn list_interfaces(&self) -> Vec<InterfaceInfo>;
}

/// Interfaces from the OS via `pnet`, gateways from the kernel routing table.
pub struct SystemInterfaces {
    route_table_path: PathBuf,
}

impl SystemInterfaces {
    pub fn new(route_table_path: impl Into<PathBuf>) -> Self {
        Self {
            route_table_path: route_table_path.into(),
        }
    }

    async fn default_gateways(&self) -> HashMap<String, Ipv4Addr> {
        match tokio::fs::read_to_string(&self.route_table_path).await {
            Ok(text) => parse_default_routes(&text),
            Err(e) => {
                tracing::debug!(
                    path = %self.route_table_path.display(),
                    error = %e,
                    "Routing table unavailable, gateways unknown"
                );
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl InterfaceSource for SystemInterfaces {
    async fn list_interfaces(&self) -> Vec<InterfaceInfo> {
        let gateways = self.default_gateways().await;
        let mut infos = Vec::new();

        for iface in datalink::interfaces() {
            if iface.is_loopback() {
                continue;
            }
            let label = if iface.description.trim().is_empty() {
                iface.name.clone()
            } else {
                iface.description.clone()
            };
            let mac = iface
                .mac
                .filter(|m| *m != MacAddr::zero())
                .map(|m| m.to_string().to_uppercase());
            let gateway = gateways.get(&iface.name).copied();

            for network in &iface.ips {
                let IpAddr::V4(ip) = network.ip() else {
                    continue;
                };
                if let Some(info) =
                    interface_info(&label, ip, network.prefix(), gateway, mac.clone())
                {
                    infos.push(info);
                }
            }
        }

        tracing::debug!(count = infos.len(), "Interfaces enumerated");
        infos
    }
}

fn interface_info(
    label: &str,
    ip: Ipv4Addr,
    prefix: u8,
    gateway: Option<Ipv4Addr>,
    hardware_address: Option<String>,
) -> Option<InterfaceInfo> {
    if ip.is_unspecified() || ip.is_link_local() || prefix == 0 {
        return None;
    }
    let net = Ipv4Net::new(ip, prefix).ok()?.trunc();
    Some(InterfaceInfo {
        address: IpAddr::V4(ip),
        cidr: net.to_string(),
        adapter_label: label.to_string(),
        gateway: gateway.filter(|gw| net.contains(gw)).map(IpAddr::V4),
        hardware_address,
    })
}

/// Default routes from `/proc/net/route`, keyed by interface name.
/// Addresses in that file are little-endian hex.
pub fn parse_default_routes(text: &str) -> HashMap<String, Ipv4Addr> {
    let mut gateways = HashMap::new();
    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[1] != "00000000" {
            continue;
        }
        let Ok(raw) = u32::from_str_radix(fields[2], 16) else {
            continue;
        };
        if raw == 0 {
            continue;
        }
        gateways
            .entry(fields[0].to_string())
            .or_insert_with(|| Ipv4Addr::from(raw.to_le_bytes()));
    }
    gateways
}

/// Addresses that belong to this machine and the gateways it routes through.
#[derive(Debug, Default, Clone)]
pub struct LocalRoles {
    local: Vec<IpAddr>,
    gateways: Vec<IpAddr>,
}

impl LocalRoles {
    pub fn from_interfaces(interfaces: &[InterfaceInfo]) -> Self {
        Self {
            local: interfaces.iter().map(|i| i.address).collect(),
            gateways: interfaces.iter().filter_map(|i| i.gateway).collect(),
        }
    }

    /// `gateway` for a default gateway, `local` for one of our own addresses.
    pub fn role_of(&self, addr: &IpAddr) -> Option<String> {
        if self.gateways.contains(addr) {
            Some("gateway".to_string())
        } else if self.local.contains(addr) {
            Some("local".to_string())
        } else {
            None
        }
    }
}
