//! netroster-discover: network sweeps and device identity reconciliation.
//!
//! Probes an address range on a bounded task pool, enriches live hosts with
//! neighbor-table, reverse-name and vendor data, and reconciles them with the
//! shared inventory so known devices are relocated instead of duplicated.
//! Also classifies inventory segments and merges paired companion devices.

pub mod classify;
pub mod companion;
pub mod config;
pub mod error;
pub mod ingest;
pub mod interfaces;
pub mod merge;
pub mod neighbor;
pub mod probe;
pub mod range;
pub mod resolve;
pub mod scheduler;
pub mod sweep;
pub mod vendor;

pub use error::{DiscoverError, Result};
pub use sweep::{Collaborators, SweepReport, Sweeper};
