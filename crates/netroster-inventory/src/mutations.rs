//! Write operations for the graph-backed inventory, and its store impl.
//!
//! A batch is written inside one Neo4j transaction. Segments use MERGE on
//! the unique subnet so a concurrent creator of the same segment is reused
//! rather than duplicated.

use std::collections::HashMap;

use async_trait::async_trait;
use neo4rs::query;

use netroster_core::{InventoryDevice, NetworkSegment, SegmentId};

use crate::client::GraphStore;
use crate::store::{InventoryBatch, InventoryStore, Result, StoreError};

impl GraphStore {
    /// Write a batch in a single transaction; roll back on the first failure.
    pub async fn apply_batch(&self, batch: InventoryBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // Devices are linked to their segment by subnet, so resolve every
        // referenced segment before opening the transaction.
        let mut subnets: HashMap<SegmentId, String> = batch
            .segments
            .iter()
            .map(|s| (s.id, s.subnet.clone()))
            .collect();
        for device in &batch.devices {
            if subnets.contains_key(&device.segment_id) {
                continue;
            }
            let segment = self.segment_by_id(&device.segment_id).await?.ok_or(
                StoreError::UnknownSegment {
                    device_id: device.id,
                    segment_id: device.segment_id,
                },
            )?;
            subnets.insert(segment.id, segment.subnet);
        }

        let mut txn = self.start_txn().await?;
        let written = async {
            for segment in &batch.segments {
                txn.run(segment_upsert(segment)).await?;
            }
            for device in &batch.devices {
                let subnet = subnets.get(&device.segment_id).ok_or(
                    StoreError::UnknownSegment {
                        device_id: device.id,
                        segment_id: device.segment_id,
                    },
                )?;
                txn.run(device_upsert(device, subnet)).await?;
            }
            Ok::<(), StoreError>(())
        }
        .await;

        match written {
            Ok(()) => txn.commit().await?,
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::warn!(error = %rollback, "Inventory rollback failed");
                }
                return Err(e);
            }
        }

        tracing::debug!(
            segments = batch.segments.len(),
            devices = batch.devices.len(),
            "Inventory batch committed to Neo4j"
        );
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for GraphStore {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>> {
        self.devices().await
    }

    async fn list_segments(&self) -> Result<Vec<NetworkSegment>> {
        self.segments().await
    }

    async fn commit(&self, batch: InventoryBatch) -> Result<()> {
        self.apply_batch(batch).await
    }

    async fn find_device_by_hardware_address(
        &self,
        hardware_address: &str,
    ) -> Result<Option<InventoryDevice>> {
        self.device_by_hardware_address(hardware_address).await
    }

    async fn find_device_by_name(&self, name: &str) -> Result<Option<InventoryDevice>> {
        self.device_by_name(name).await
    }

    async fn find_device_by_address(&self, address: &str) -> Result<Option<InventoryDevice>> {
        self.device_by_address(address).await
    }

    async fn find_segment_by_subnet(&self, subnet: &str) -> Result<Option<NetworkSegment>> {
        self.segment_by_subnet(subnet).await
    }

    async fn device_counts(&self) -> Result<HashMap<SegmentId, usize>> {
        self.segment_device_counts().await
    }
}

// ── Queries ──────────────────────────────────────────────────────

fn segment_upsert(segment: &NetworkSegment) -> neo4rs::Query {
    query(
        "MERGE (s:Segment {subnet: $subnet})
         ON CREATE SET
           s.id = $id, s.name = $name, s.vlan_id = $vlan_id,
           s.gateway = $gateway, s.description = $description",
    )
    .param("subnet", segment.subnet.clone())
    .param("id", segment.id.0.to_string())
    .param("name", segment.name.clone())
    .param(
        "vlan_id",
        segment.vlan_id.map(|v| v.to_string()).unwrap_or_default(),
    )
    .param("gateway", opt_string(&segment.gateway))
    .param("description", opt_string(&segment.description))
}

fn device_upsert(device: &InventoryDevice, subnet: &str) -> neo4rs::Query {
    query(
        "MATCH (s:Segment {subnet: $subnet})
         MERGE (d:Device {id: $id})
         SET
           d.name = $name, d.address = $address,
           d.hardware_address = $hardware_address, d.vendor = $vendor,
           d.os = $os, d.device_type = $device_type, d.status = $status,
           d.segment_id = s.id, d.solutions = $solutions,
           d.vulnerabilities = $vulnerabilities, d.updated_at = $updated_at
         WITH d, s
         OPTIONAL MATCH (d)-[old:BELONGS_TO]->(:Segment)
         DELETE old
         WITH DISTINCT d, s
         MERGE (d)-[:BELONGS_TO]->(s)",
    )
    .param("subnet", subnet.to_string())
    .param("id", device.id.0.to_string())
    .param("name", device.name.clone())
    .param("address", device.address.clone())
    .param("hardware_address", opt_string(&device.hardware_address))
    .param("vendor", opt_string(&device.vendor))
    .param("os", opt_string(&device.os))
    .param("device_type", opt_string(&device.device_type))
    .param("status", device.status.as_str())
    .param("solutions", device.solutions.clone())
    .param("vulnerabilities", device.vulnerabilities.clone())
    .param("updated_at", device.updated_at.to_rfc3339())
}

fn opt_string(opt: &Option<String>) -> String {
    opt.clone().unwrap_or_default()
}
