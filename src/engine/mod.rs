//! Execution engine module
//!
//! Checkpointed iteration and job orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `CheckpointIterator` - Consumes items once each, with dedup, failure
//!   isolation and periodic flushes of the sink and the checkpoint
//! - `Harvester` - Plans the remaining units and drains them one at a time
//! - `RecordTransform` - Default key derivation and projection for JSON items
//! - `Interrupt` - Cooperative stop signal checked between items and raced
//!   against backoff waits

mod harvester;
mod iterator;
mod transform;
mod types;

pub use harvester::Harvester;
pub use iterator::CheckpointIterator;
pub use transform::RecordTransform;
pub use types::{
    FailedItem, HarvestOptions, HarvestReport, Interrupt, ItemOutcome, IteratorOptions,
    RunSummary, UnitFailure,
};
