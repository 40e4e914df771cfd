//! Companion (paired short-range device) reconciliation.
//!
//! Paired devices have no network address. They are merged into the shared
//! inventory by hardware address only and live in a dedicated pseudo-segment.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

use netroster_core::{
    normalize_hardware_address, CompanionKind, CompanionRecord, ConnectionState, DeviceStatus,
    EventPayload, EventSource, InventoryDevice, InventoryEvent, NetworkSegment,
    COMPANION_ADDRESS_PREFIX, COMPANION_SUBNET,
};
use netroster_inventory::{InventoryBatch, InventoryStore};

use crate::error::{DiscoverError, Result};
use crate::ingest;
use crate::vendor::VendorLookup;

/// Enumerates paired devices together with their connectivity status.
#[async_trait]
pub trait PairedDeviceSource: Send + Sync {
    async fn paired_devices(&self) -> Result<Vec<CompanionRecord>>;
}

/// Runs an external command that prints PnP JSON.
pub struct CommandSource {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandSource {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl PairedDeviceSource for CommandSource {
    async fn paired_devices(&self) -> Result<Vec<CompanionRecord>> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| DiscoverError::Config("companion_command is empty".to_string()))?;

        let run = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| DiscoverError::Companion(format!("{program} timed out")))?
            .map_err(|e| DiscoverError::Companion(format!("{program}: {e}")))?;

        if !output.status.success() {
            return Err(DiscoverError::Companion(format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        ingest::parse_pnp_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Collapse profile duplicates of the same physical device.
///
/// Records with empty names are dropped. Among records sharing a hardware
/// address (compared in normalised form) the shorter name wins; at equal
/// length a connected record wins; otherwise the first one seen is kept.
/// Records without a hardware address pass through and follow the
/// de-duplicated ones.
pub fn select_best(records: Vec<CompanionRecord>) -> Vec<CompanionRecord> {
    let mut by_hw: Vec<CompanionRecord> = Vec::new();
    let mut without_hw = Vec::new();

    for record in records.into_iter().filter(|r| !r.name.trim().is_empty()) {
        let Some(hw) = record.hardware_address.as_deref().map(normalize_hardware_address) else {
            without_hw.push(record);
            continue;
        };
        match by_hw.iter_mut().find(|kept| {
            kept.hardware_address
                .as_deref()
                .is_some_and(|k| normalize_hardware_address(k) == hw)
        }) {
            Some(kept) if is_better(&record, kept) => *kept = record,
            Some(_) => {}
            None => by_hw.push(record),
        }
    }

    by_hw.extend(without_hw);
    by_hw
}

fn is_better(candidate: &CompanionRecord, kept: &CompanionRecord) -> bool {
    let (a, b) = (candidate.name.chars().count(), kept.name.chars().count());
    a < b || (a == b && candidate.status.is_connected() && !kept.status.is_connected())
}

/// A paired device as listed for the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionScanResult {
    pub name: String,
    pub hardware_address: Option<String>,
    pub status: ConnectionState,
    pub kind: CompanionKind,
    pub vendor: Option<String>,
    pub already_known: bool,
}

/// List paired devices, marking those whose hardware address is already
/// anywhere in the inventory.
pub async fn scan(
    source: &dyn PairedDeviceSource,
    store: &dyn InventoryStore,
    vendors: &dyn VendorLookup,
) -> Result<Vec<CompanionScanResult>> {
    let records = select_best(source.paired_devices().await?);
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        let (vendor, already_known) = match &record.hardware_address {
            Some(hw) => (
                vendors.vendor(hw),
                store.find_device_by_hardware_address(hw).await?.is_some(),
            ),
            None => (None, false),
        };
        results.push(CompanionScanResult {
            name: record.name,
            hardware_address: record.hardware_address,
            status: record.status,
            kind: record.kind,
            vendor,
            already_known,
        });
    }

    tracing::info!(count = results.len(), "Paired devices listed");
    Ok(results)
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub imported: usize,
    pub renamed: usize,
    pub events: Vec<InventoryEvent>,
}

/// Merge selected records into the inventory in one batch.
///
/// A record whose hardware address is already known only refreshes that
/// device's name. Anything else becomes a new active device in the
/// companion segment, which is created on first use.
pub async fn import(
    store: &dyn InventoryStore,
    vendors: &dyn VendorLookup,
    records: Vec<CompanionRecord>,
) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();
    let mut batch = InventoryBatch::default();
    let mut segment_id = store
        .find_segment_by_subnet(COMPANION_SUBNET)
        .await?
        .map(|s| s.id);

    for record in select_best(records) {
        if let Some(hw) = &record.hardware_address {
            if let Some(mut existing) = store.find_device_by_hardware_address(hw).await? {
                if existing.name != record.name {
                    existing.name = record.name.clone();
                    existing.updated_at = chrono::Utc::now();
                    outcome.events.push(InventoryEvent::new(
                        EventSource::Companion,
                        EventPayload::DeviceRenamed {
                            device_id: existing.id,
                            name: existing.name.clone(),
                        },
                    ));
                    batch.upsert_device(existing);
                    outcome.renamed += 1;
                }
                continue;
            }
        }

        let seg = match segment_id {
            Some(id) => id,
            None => {
                let segment = NetworkSegment::companion();
                let id = batch.add_segment(segment);
                outcome.events.push(InventoryEvent::new(
                    EventSource::Companion,
                    EventPayload::SegmentCreated {
                        segment_id: id,
                        subnet: COMPANION_SUBNET.to_string(),
                    },
                ));
                segment_id = Some(id);
                id
            }
        };

        let mut device = InventoryDevice::new(record.name.clone(), record.synthetic_address(), seg);
        device.vendor = record
            .hardware_address
            .as_deref()
            .and_then(|hw| vendors.vendor(hw));
        device.hardware_address = record.hardware_address.clone();
        device.device_type = Some(record.kind.as_str().to_string());
        device.status = DeviceStatus::Active;

        outcome.events.push(InventoryEvent::new(
            EventSource::Companion,
            EventPayload::DeviceImported {
                device_id: device.id,
                address: device.address.clone(),
            },
        ));
        batch.upsert_device(device);
        outcome.imported += 1;
    }

    if !batch.is_empty() {
        store.commit(batch).await?;
    }
    tracing::info!(
        imported = outcome.imported,
        renamed = outcome.renamed,
        "Paired devices imported"
    );
    Ok(outcome)
}

#[derive(Debug, Default)]
pub struct RefreshOutcome {
    pub updated: usize,
    pub events: Vec<InventoryEvent>,
}

/// Re-poll the source and set every known companion device active or
/// inactive from whether its hardware address reports as connected.
/// Devices without a hardware address are left alone.
pub async fn refresh_status(
    source: &dyn PairedDeviceSource,
    store: &dyn InventoryStore,
) -> Result<RefreshOutcome> {
    let companions: Vec<InventoryDevice> = store
        .list_devices()
        .await?
        .into_iter()
        .filter(|d| d.address.starts_with(COMPANION_ADDRESS_PREFIX))
        .collect();
    let mut outcome = RefreshOutcome::default();
    if companions.is_empty() {
        return Ok(outcome);
    }

    let live: HashMap<String, bool> = select_best(source.paired_devices().await?)
        .into_iter()
        .filter_map(|r| {
            let connected = r.status.is_connected();
            r.hardware_address.map(|hw| (hw.to_uppercase(), connected))
        })
        .collect();

    let mut batch = InventoryBatch::default();
    for mut device in companions {
        let Some(hw) = device.hardware_address.as_deref() else {
            continue;
        };
        let connected = live.get(&hw.to_uppercase()).copied().unwrap_or(false);
        let status = if connected {
            DeviceStatus::Active
        } else {
            DeviceStatus::Inactive
        };
        if device.status == status {
            continue;
        }

        device.status = status;
        device.updated_at = chrono::Utc::now();
        outcome.events.push(InventoryEvent::new(
            EventSource::Companion,
            EventPayload::StatusChanged {
                device_id: device.id,
                status,
            },
        ));
        batch.upsert_device(device);
        outcome.updated += 1;
    }

    if !batch.is_empty() {
        store.commit(batch).await?;
    }
    tracing::info!(updated = outcome.updated, "Paired device status refreshed");
    Ok(outcome)
}
