//! Error types for the netroster-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Invalid range {range:?}: {reason}")]
    InvalidRange { range: String, reason: String },

    #[error("Inventory error: {0}")]
    Store(#[from] netroster_inventory::StoreError),

    #[error("Paired-device source failed: {0}")]
    Companion(String),

    #[error("Failed to parse client records: {0}")]
    Ingest(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoverError {
    pub(crate) fn invalid_range(range: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            range: range.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
