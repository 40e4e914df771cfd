//! Ingestion boundary for loosely-typed discovery records.
//!
//! Raw records from the paired-device source and from router client lists
//! come with unpredictable shapes and key names. They are normalised here,
//! once, into [`CompanionRecord`] and [`DiscoveredHost`]; nothing past this
//! module guesses at keys.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use serde::Deserialize;
use serde_json::{Map, Value};

use netroster_core::{normalize_hardware_address, CompanionRecord, DiscoveredHost};

use crate::error::{DiscoverError, Result};

/// Deepest nesting searched for client lists.
const MAX_CLIENT_DEPTH: usize = 8;

const ADDRESS_KEYS: &[&str] = &[
    "ip_addr",
    "ip_address",
    "ip",
    "ipAddr",
    "IP",
    "ipAddress",
    "address",
];
const HARDWARE_KEYS: &[&str] = &[
    "mac_addr",
    "mac_address",
    "mac",
    "macAddr",
    "MAC",
    "macAddress",
    "hwaddr",
    "hwAddr",
];
const NAME_KEYS: &[&str] = &[
    "client_name",
    "hostname",
    "name",
    "host_name",
    "hostName",
    "deviceName",
    "device_name",
    "client_hostname",
];

// ── Paired devices ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PnpEntry {
    #[serde(rename = "FriendlyName", default)]
    friendly_name: Option<String>,
    #[serde(rename = "Status", default)]
    status: Option<String>,
    #[serde(rename = "InstanceId", default)]
    instance_id: Option<String>,
}

/// The PnP query prints a bare object when there is exactly one device.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<PnpEntry>),
    One(PnpEntry),
}

/// Parse PnP-style JSON into companion records.
pub fn parse_pnp_json(text: &str) -> Result<Vec<CompanionRecord>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let entries = match serde_json::from_str::<OneOrMany>(trimmed)
        .map_err(|e| DiscoverError::Ingest(e.to_string()))?
    {
        OneOrMany::One(entry) => vec![entry],
        OneOrMany::Many(entries) => entries,
    };

    Ok(entries
        .into_iter()
        .map(|entry| {
            let hw = entry
                .instance_id
                .as_deref()
                .and_then(hardware_address_from_instance_id);
            CompanionRecord::new(
                entry.friendly_name.unwrap_or_default().trim(),
                hw,
                entry.status.as_deref().unwrap_or_default(),
            )
        })
        .collect())
}

/// Pull the 12-hex-digit device address out of an instance id. Two layouts
/// occur: `BTHENUM\DEV_AABBCCDDEEFF\...` and `...&0&AABBCCDDEEFF_C00000000`.
pub fn hardware_address_from_instance_id(instance_id: &str) -> Option<String> {
    let upper = instance_id.to_ascii_uppercase();

    let dev_form = upper
        .match_indices("DEV_")
        .find_map(|(i, _)| hex12(&upper[i + 4..]));
    let profile_form = || {
        upper.match_indices("&0&").find_map(|(i, _)| {
            let rest = &upper[i + 3..];
            hex12(rest).filter(|_| rest[12..].starts_with('_'))
        })
    };

    dev_form.or_else(profile_form).map(|raw| {
        raw.as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(":")
    })
}

fn hex12(s: &str) -> Option<&str> {
    let candidate = s.get(..12)?;
    candidate
        .chars()
        .all(|c| c.is_ascii_hexdigit())
        .then_some(candidate)
}

// ── Router client lists ──────────────────────────────────────────

/// Parse a router client list of arbitrary shape into discovered hosts,
/// de-duplicated by address (first occurrence wins).
pub fn parse_client_records(text: &str) -> Result<Vec<DiscoveredHost>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DiscoverError::Ingest(e.to_string()))?;

    let mut clients = Vec::new();
    extract_clients(&value, 0, &mut clients);

    let mut seen = HashSet::new();
    clients.retain(|host: &DiscoveredHost| seen.insert(host.address));
    Ok(clients)
}

fn extract_clients(value: &Value, depth: usize, out: &mut Vec<DiscoveredHost>) {
    if depth > MAX_CLIENT_DEPTH {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                let Value::Object(obj) = item else {
                    continue;
                };
                match client_from_object(obj) {
                    Some(host) => out.push(host),
                    None => extract_clients(item, depth + 1, out),
                }
            }
        }
        Value::Object(obj) => {
            for nested in obj.values() {
                if nested.is_array() || nested.is_object() {
                    extract_clients(nested, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

fn client_from_object(obj: &Map<String, Value>) -> Option<DiscoveredHost> {
    let address: Ipv4Addr = first_text(obj, ADDRESS_KEYS)?.trim().parse().ok()?;
    let address = IpAddr::V4(address);

    let name = first_text(obj, NAME_KEYS)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| address.to_string());

    let mut host = DiscoveredHost::new(address, name);
    host.hardware_address =
        first_text(obj, HARDWARE_KEYS).map(|hw| normalize_hardware_address(&hw));
    Some(host)
}

/// The first key holding a non-empty string. Numbers count as their text.
fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| match obj.get(*k)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .find(|v| !v.trim().is_empty())
}
