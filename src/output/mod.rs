//! Output module for persisting harvest results
//!
//! This module handles:
//! - The per-run directory layout
//! - Partition snapshots and the third-party link ledger
//! - Resource manifests used to resume downloads
//! - Run summaries

mod layout;
mod ledger;
mod manifest;
mod snapshot;
pub mod stats;

pub use layout::{sanitize_component, OutputLayout};
pub use ledger::LinkLedger;
pub use manifest::{ResourceManifest, MANIFEST_SUFFIX};
pub use snapshot::{SnapshotReport, SnapshotWriter};
pub use stats::{
    format_markdown_summary, print_summary, write_markdown_summary, HarvestSummary,
    PartitionReport,
};
