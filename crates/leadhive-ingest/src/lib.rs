//! The leadhive ingestion pipeline.
//!
//! Wires the pieces of one collection run together: the merge engine (create
//! vs. update decisions against the lead store), the session accountant
//! (per-run counters and audit rows), and the coordinator (adapters ×
//! categories sequencing with error containment). Record normalization and
//! identity resolution live in `leadhive-core`; this crate only orchestrates
//! them.

pub mod accountant;
pub mod adapters;
pub mod coordinator;
pub mod merge;

pub use accountant::SessionAccountant;
pub use adapters::JsonFileAdapter;
pub use coordinator::{IngestCoordinator, RunSummary};
pub use merge::MergeEngine;

#[cfg(test)]
mod tests;
