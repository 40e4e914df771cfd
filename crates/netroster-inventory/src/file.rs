//! JSON-file backed inventory.
//!
//! The whole inventory lives in one JSON document. Reads are served from
//! memory; every commit writes a sibling temp file and renames it over the
//! original, so a crash never leaves a half-written inventory behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use netroster_core::{InventoryDevice, NetworkSegment};

use crate::memory::Inventory;
use crate::store::{InventoryBatch, InventoryStore, Result, StoreError};

pub struct FileStore {
    path: PathBuf,
    state: RwLock<Inventory>,
}

impl FileStore {
    /// Open the inventory at `path`, starting empty if the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inventory = match fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Inventory::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            path = %path.display(),
            segments = inventory.segments.len(),
            devices = inventory.devices.len(),
            "Inventory file opened"
        );

        Ok(Self {
            path,
            state: RwLock::new(inventory),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, inventory: &Inventory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(inventory)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for FileStore {
    async fn list_devices(&self) -> Result<Vec<InventoryDevice>> {
        Ok(self.state.read().await.devices.clone())
    }

    async fn list_segments(&self) -> Result<Vec<NetworkSegment>> {
        Ok(self.state.read().await.segments.clone())
    }

    async fn commit(&self, batch: InventoryBatch) -> Result<()> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        next.apply(batch)?;
        self.persist(&next).await?;
        *state = next;

        tracing::debug!(path = %self.path.display(), "Inventory file written");
        Ok(())
    }
}
