//! netroster-inventory: the device inventory store.
//!
//! Every inventory read and write goes through the [`InventoryStore`] trait.
//! Three backends are provided: an in-memory store, a JSON file store and a
//! Neo4j graph store. All of them commit a batch atomically.

pub mod client;
pub mod file;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use client::{GraphConfig, GraphStore};
pub use file::FileStore;
pub use memory::{Inventory, MemoryStore};
pub use store::{InventoryBatch, InventoryStore, StoreError};
