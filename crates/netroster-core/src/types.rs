//! Core domain types for the netroster device inventory.
//!
//! These types describe declared network segments, the devices recorded in
//! them, and the ephemeral shapes produced while sweeping a range. They are
//! shared by the inventory store backends and the discovery engine.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subnet marker of the pseudo-segment that holds paired short-range devices.
pub const COMPANION_SUBNET: &str = "bluetooth";

/// Display name of the companion pseudo-segment.
pub const COMPANION_SEGMENT_NAME: &str = "Bluetooth";

/// Primary-address prefix synthesized for companion devices.
pub const COMPANION_ADDRESS_PREFIX: &str = "bt:";

// ── Identifiers ───────────────────────────────────────────────────

/// Unique identifier for a network segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an inventory device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub Uuid);

impl DeviceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Inventory ─────────────────────────────────────────────────────

/// A declared subnet. The `subnet` text is unique across the inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSegment {
    pub id: SegmentId,
    pub name: String,
    pub subnet: String,
    pub vlan_id: Option<u16>,
    pub gateway: Option<String>,
    pub description: Option<String>,
}

impl NetworkSegment {
    /// A segment with only a name and subnet set.
    pub fn new(name: impl Into<String>, subnet: impl Into<String>) -> Self {
        Self {
            id: SegmentId::new(),
            name: name.into(),
            subnet: subnet.into(),
            vlan_id: None,
            gateway: None,
            description: None,
        }
    }

    /// The pseudo-segment that owns paired companion devices.
    pub fn companion() -> Self {
        Self::new(COMPANION_SEGMENT_NAME, COMPANION_SUBNET)
    }

    pub fn is_companion(&self) -> bool {
        self.subnet == COMPANION_SUBNET
    }
}

/// Operational status of an inventory device.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Active,
    Inactive,
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a stored status; anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            _ => Self::Unknown,
        }
    }
}

/// A device recorded in the inventory. It belongs to exactly one segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryDevice {
    pub id: DeviceId,
    pub name: String,
    pub address: String,
    pub hardware_address: Option<String>,
    pub vendor: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub status: DeviceStatus,
    pub segment_id: SegmentId,
    #[serde(default)]
    pub solutions: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryDevice {
    /// A new active device with only identity fields set.
    pub fn new(name: impl Into<String>, address: impl Into<String>, segment_id: SegmentId) -> Self {
        Self {
            id: DeviceId::new(),
            name: name.into(),
            address: address.into(),
            hardware_address: None,
            vendor: None,
            os: None,
            device_type: None,
            status: DeviceStatus::Active,
            segment_id,
            solutions: Vec::new(),
            vulnerabilities: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Case-insensitive hardware-address comparison.
    pub fn has_hardware_address(&self, hw: &str) -> bool {
        self.hardware_address
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(hw))
    }

    /// Case-insensitive display-name comparison, Unicode-aware.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

// ── Discovery ─────────────────────────────────────────────────────

/// A live host assembled during a sweep. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredHost {
    pub address: IpAddr,
    /// Short resolved name, or the address text when resolution failed.
    pub resolved_name: String,
    pub hardware_address: Option<String>,
    pub vendor: Option<String>,
    pub already_known: bool,
    pub role: Option<String>,
}

impl DiscoveredHost {
    pub fn new(address: IpAddr, resolved_name: impl Into<String>) -> Self {
        Self {
            address,
            resolved_name: resolved_name.into(),
            hardware_address: None,
            vendor: None,
            already_known: false,
            role: None,
        }
    }

    /// True when no real name was resolved and the name is the address itself.
    pub fn has_fallback_name(&self) -> bool {
        self.resolved_name
            .eq_ignore_ascii_case(&self.address.to_string())
    }
}

/// One reported host of a sweep, in ascending address order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub address: String,
    pub resolved_name: String,
    pub hardware_address: Option<String>,
    pub vendor: Option<String>,
    pub already_known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl From<&DiscoveredHost> for ScanResult {
    fn from(host: &DiscoveredHost) -> Self {
        Self {
            address: host.address.to_string(),
            resolved_name: host.resolved_name.clone(),
            hardware_address: host.hardware_address.clone(),
            vendor: host.vendor.clone(),
            already_known: host.already_known,
            role: host.role.clone(),
        }
    }
}

/// Live interface metadata of the machine running the sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    pub address: IpAddr,
    /// The interface's subnet in canonical CIDR form.
    pub cidr: String,
    pub adapter_label: String,
    pub gateway: Option<IpAddr>,
    pub hardware_address: Option<String>,
}

// ── Companion devices ─────────────────────────────────────────────

/// Connectivity status reported by the paired-device source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ConnectionState {
    Connected,
    Error,
    Other(String),
}

impl ConnectionState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            s if s.eq_ignore_ascii_case("ok") => Self::Connected,
            s if s.eq_ignore_ascii_case("error") => Self::Error,
            s => Self::Other(s.to_string()),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl From<String> for ConnectionState {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ConnectionState> for String {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => "OK".to_string(),
            ConnectionState::Error => "Error".to_string(),
            ConnectionState::Other(s) => s,
        }
    }
}

/// Coarse type tag for a paired device, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanionKind {
    BtAudio,
    BtInput,
    BtOther,
}

impl CompanionKind {
    const AUDIO: &'static [&'static str] = &[
        "headphone",
        "headset",
        "earphone",
        "buds",
        "speaker",
        "audio",
        "airpods",
        "soundbar",
    ];
    const INPUT: &'static [&'static str] =
        &["mouse", "keyboard", "gamepad", "controller", "pen", "stylus"];

    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if Self::AUDIO.iter().any(|kw| lower.contains(kw)) {
            Self::BtAudio
        } else if Self::INPUT.iter().any(|kw| lower.contains(kw)) {
            Self::BtInput
        } else {
            Self::BtOther
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BtAudio => "bt_audio",
            Self::BtInput => "bt_input",
            Self::BtOther => "bt_other",
        }
    }
}

/// A normalised record from the paired-device source.
///
/// Deserialization goes through [`CompanionRecord::new`], so hardware
/// addresses read from JSON are normalised and a missing `kind` is inferred
/// from the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CompanionRecordFields")]
pub struct CompanionRecord {
    pub name: String,
    pub hardware_address: Option<String>,
    pub status: ConnectionState,
    pub kind: CompanionKind,
}

impl CompanionRecord {
    pub fn new(name: impl Into<String>, hardware_address: Option<String>, status: &str) -> Self {
        let name = name.into();
        let kind = CompanionKind::from_name(&name);
        Self {
            name,
            hardware_address: hardware_address
                .map(|hw| normalize_hardware_address(&hw))
                .filter(|hw| !hw.is_empty()),
            status: ConnectionState::parse(status),
            kind,
        }
    }

    /// The primary address synthesized for this record's inventory device.
    pub fn synthetic_address(&self) -> String {
        match &self.hardware_address {
            Some(hw) => format!("{COMPANION_ADDRESS_PREFIX}{hw}"),
            None => format!("{COMPANION_ADDRESS_PREFIX}{}", self.name),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompanionRecordFields {
    name: String,
    #[serde(default)]
    hardware_address: Option<String>,
    status: String,
    #[serde(default)]
    kind: Option<CompanionKind>,
}

impl From<CompanionRecordFields> for CompanionRecord {
    fn from(fields: CompanionRecordFields) -> Self {
        let mut record = Self::new(fields.name, fields.hardware_address, &fields.status);
        if let Some(kind) = fields.kind {
            record.kind = kind;
        }
        record
    }
}

/// Normalise a hardware address to upper-case, colon-separated form.
pub fn normalize_hardware_address(raw: &str) -> String {
    raw.trim().to_uppercase().replace('-', ":")
}
