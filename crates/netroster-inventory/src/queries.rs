//! Read operations against the graph-backed inventory.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use neo4rs::query;
use uuid::Uuid;

use netroster_core::{DeviceId, DeviceStatus, InventoryDevice, NetworkSegment, SegmentId};

use crate::client::GraphStore;
use crate::store::{Result, StoreError};

impl GraphStore {
    // ── List Queries ─────────────────────────────────────────────

    /// All devices, ordered by primary address.
    pub async fn devices(&self) -> Result<Vec<InventoryDevice>> {
        let rows = self
            .query_rows(query("MATCH (d:Device) RETURN d ORDER BY d.address"))
            .await?;
        rows.iter().map(|row| device_from_row(row, "d")).collect()
    }

    /// All segments, ordered by subnet.
    pub async fn segments(&self) -> Result<Vec<NetworkSegment>> {
        let rows = self
            .query_rows(query("MATCH (s:Segment) RETURN s ORDER BY s.subnet"))
            .await?;
        rows.iter().map(|row| segment_from_row(row, "s")).collect()
    }

    // ── Single Lookups ───────────────────────────────────────────

    pub async fn device_by_hardware_address(
        &self,
        hardware_address: &str,
    ) -> Result<Option<InventoryDevice>> {
        let q = query(
            "MATCH (d:Device)
             WHERE toUpper(d.hardware_address) = $value
             RETURN d LIMIT 1",
        )
        .param("value", hardware_address.to_uppercase());
        self.optional_device(q).await
    }

    pub async fn device_by_name(&self, name: &str) -> Result<Option<InventoryDevice>> {
        let q = query(
            "MATCH (d:Device)
             WHERE toLower(d.name) = $value
             RETURN d LIMIT 1",
        )
        .param("value", name.to_lowercase());
        self.optional_device(q).await
    }

    pub async fn device_by_address(&self, address: &str) -> Result<Option<InventoryDevice>> {
        let q = query("MATCH (d:Device {address: $value}) RETURN d LIMIT 1")
            .param("value", address.to_string());
        self.optional_device(q).await
    }

    pub async fn segment_by_subnet(&self, subnet: &str) -> Result<Option<NetworkSegment>> {
        let q = query("MATCH (s:Segment {subnet: $value}) RETURN s LIMIT 1")
            .param("value", subnet.to_string());
        match self.query_one(q).await? {
            Some(row) => Ok(Some(segment_from_row(&row, "s")?)),
            None => Ok(None),
        }
    }

    pub async fn segment_by_id(&self, id: &SegmentId) -> Result<Option<NetworkSegment>> {
        let q = query("MATCH (s:Segment {id: $value}) RETURN s LIMIT 1")
            .param("value", id.0.to_string());
        match self.query_one(q).await? {
            Some(row) => Ok(Some(segment_from_row(&row, "s")?)),
            None => Ok(None),
        }
    }

    /// Device count per owning segment.
    pub async fn segment_device_counts(&self) -> Result<HashMap<SegmentId, usize>> {
        let rows = self
            .query_rows(query(
                "MATCH (d:Device)-[:BELONGS_TO]->(s:Segment)
                 RETURN s.id AS segment_id, count(d) AS cnt",
            ))
            .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("segment_id").unwrap_or_default();
            let cnt: i64 = row.get("cnt").unwrap_or(0);
            counts.insert(SegmentId(parse_uuid(&raw)?), cnt.max(0) as usize);
        }
        Ok(counts)
    }

    async fn optional_device(&self, q: neo4rs::Query) -> Result<Option<InventoryDevice>> {
        match self.query_one(q).await? {
            Some(row) => Ok(Some(device_from_row(&row, "d")?)),
            None => Ok(None),
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────

fn device_from_row(row: &neo4rs::Row, key: &str) -> Result<InventoryDevice> {
    let node: neo4rs::Node = row
        .get(key)
        .map_err(|e| StoreError::Serialization(format!("Failed to deserialize device: {e}")))?;

    Ok(InventoryDevice {
        id: DeviceId(parse_uuid(&node.get::<String>("id").unwrap_or_default())?),
        name: node.get("name").unwrap_or_default(),
        address: node.get("address").unwrap_or_default(),
        hardware_address: opt_prop(&node, "hardware_address"),
        vendor: opt_prop(&node, "vendor"),
        os: opt_prop(&node, "os"),
        device_type: opt_prop(&node, "device_type"),
        status: DeviceStatus::parse(&node.get::<String>("status").unwrap_or_default()),
        segment_id: SegmentId(parse_uuid(
            &node.get::<String>("segment_id").unwrap_or_default(),
        )?),
        solutions: node.get("solutions").unwrap_or_default(),
        vulnerabilities: node.get("vulnerabilities").unwrap_or_default(),
        updated_at: opt_prop(&node, "updated_at")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    })
}

fn segment_from_row(row: &neo4rs::Row, key: &str) -> Result<NetworkSegment> {
    let node: neo4rs::Node = row
        .get(key)
        .map_err(|e| StoreError::Serialization(format!("Failed to deserialize segment: {e}")))?;

    Ok(NetworkSegment {
        id: SegmentId(parse_uuid(&node.get::<String>("id").unwrap_or_default())?),
        name: node.get("name").unwrap_or_default(),
        subnet: node.get("subnet").unwrap_or_default(),
        vlan_id: opt_prop(&node, "vlan_id").and_then(|v| v.parse().ok()),
        gateway: opt_prop(&node, "gateway"),
        description: opt_prop(&node, "description"),
    })
}

/// Optional properties are stored as empty strings.
fn opt_prop(node: &neo4rs::Node, key: &str) -> Option<String> {
    node.get::<String>(key).ok().filter(|v| !v.is_empty())
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Serialization(format!("Bad id {raw:?}: {e}")))
}
