//! Range expansion: CIDR text to the bounded set of candidate host addresses.

use std::net::{IpAddr, Ipv4Addr};

use ipnet::{IpNet, Ipv4Net};

use crate::error::{DiscoverError, Result};

/// Largest number of usable hosts a single sweep may target.
pub const MAX_SWEEP_HOSTS: u64 = 1024;

/// A validated IPv4 sweep range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRange {
    net: Ipv4Net,
}

impl SweepRange {
    /// Parse and validate a range. Host bits are truncated, so
    /// `192.168.1.7/24` becomes `192.168.1.0/24`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let net: IpNet = trimmed
            .parse()
            .map_err(|e| DiscoverError::invalid_range(raw, format!("{e}")))?;
        let net = match net {
            IpNet::V4(v4) => v4.trunc(),
            IpNet::V6(_) => {
                return Err(DiscoverError::invalid_range(
                    raw,
                    "only IPv4 ranges are supported",
                ))
            }
        };

        let count = usable_host_count(net.prefix_len());
        if count > MAX_SWEEP_HOSTS {
            return Err(DiscoverError::invalid_range(
                raw,
                format!("{count} usable hosts exceeds the limit of {MAX_SWEEP_HOSTS}"),
            ));
        }

        Ok(Self { net })
    }

    /// Canonical CIDR text, used as the segment subnet.
    pub fn cidr(&self) -> String {
        self.net.to_string()
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => self.net.contains(v4),
            IpAddr::V6(_) => false,
        }
    }

    pub fn host_count(&self) -> u64 {
        usable_host_count(self.net.prefix_len())
    }

    /// Usable host addresses in ascending order. Network and broadcast
    /// addresses are excluded for prefixes shorter than /31.
    pub fn hosts(&self) -> Vec<Ipv4Addr> {
        self.net.hosts().collect()
    }
}

impl std::fmt::Display for SweepRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net)
    }
}

fn usable_host_count(prefix_len: u8) -> u64 {
    match prefix_len {
        32 => 1,
        31 => 2,
        p => (1u64 << (32 - u32::from(p))) - 2,
    }
}

/// Whether two subnet texts denote the same network, ignoring host bits.
/// Text that is not a CIDR (such as the companion marker) compares exactly.
pub fn same_network(a: &str, b: &str) -> bool {
    match (a.trim().parse::<IpNet>(), b.trim().parse::<IpNet>()) {
        (Ok(a), Ok(b)) => a.trunc() == b.trunc(),
        _ => a == b,
    }
}
