//! Checkpoint module
//!
//! Handles dedup keys, per-key outcomes, and atomic persistence between runs.
//!
//! # Overview
//!
//! The checkpoint module provides:
//! - `Checkpoint` - In-memory map of key to outcome plus the work-unit ledger
//! - `CheckpointStore` - Atomic file persistence (temp file + rename)
//! - `ItemKey` - Canonical string encoding for typed dedup keys
//!
//! A checkpoint is loaded once per run, mutated in memory as items are
//! processed, and saved at flush boundaries. Losing the file is safe but
//! degraded: the planner falls back to scanning the output.

mod key;
mod store;
mod types;

pub use key::ItemKey;
pub use store::CheckpointStore;
pub use types::{
    Checkpoint, CheckpointEntry, CheckpointSummary, EntryStatus, UnitEntry, UnitStatus,
    CHECKPOINT_VERSION,
};

#[cfg(test)]
mod store_tests;
