//! Engine types
//!
//! Options, outcomes and run summaries for the iterator and the harvester.

use crate::planner::UnitKey;
pub use crate::types::Interrupt;
use crate::types::DedupScope;
use serde::Serialize;

/// What happened to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Processed; a result was appended to the sink
    Emitted,
    /// Processed; no result (still a success)
    Empty,
    /// Processing failed; recorded in the checkpoint
    Failed(String),
    /// Already done (checkpoint or earlier in this run); not processed
    Skipped,
}

/// An item whose processing failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Checkpoint key
    pub key: String,
    /// Error with its context chain
    pub error: String,
}

/// Counts for one iterator run (or the sum of several)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items processed successfully (with or without a result)
    pub succeeded: u64,
    /// Items whose processing failed
    pub failed: u64,
    /// Items skipped as already done
    pub skipped: u64,
    /// Results appended to the sink
    pub emitted: u64,
    /// Completed flushes
    pub flushes: u64,
    /// Failed items in processing order
    pub failures: Vec<FailedItem>,
    /// The run stopped on an interrupt
    pub interrupted: bool,
}

impl RunSummary {
    /// Items processed or skipped
    pub fn seen(&self) -> u64 {
        self.succeeded + self.failed + self.skipped
    }

    /// Add another summary's counts to this one
    pub fn merge(&mut self, other: &RunSummary) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.emitted += other.emitted;
        self.flushes += other.flushes;
        self.failures.extend(other.failures.iter().cloned());
        self.interrupted |= other.interrupted;
    }
}

/// Iterator behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorOptions {
    /// Items between flushes (at least 1)
    pub flush_interval: usize,
    /// Re-attempt keys recorded as failed
    pub retry_failed: bool,
    /// Store each serialized result as its success detail
    pub record_details: bool,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            flush_interval: 100,
            retry_failed: false,
            record_details: false,
        }
    }
}

/// Harvester behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOptions {
    /// Requested page size
    pub page_size: u32,
    /// Items between flushes
    pub flush_interval: usize,
    /// Whether item keys are global or scoped to their unit
    pub dedup_scope: DedupScope,
    /// Re-attempt keys recorded as failed
    pub retry_failed: bool,
    /// Store each serialized result as its success detail
    pub record_details: bool,
    /// Attempts per unit before it is marked failed
    pub unit_attempts: u32,
    /// Stop the run when a unit exhausts its rate-limit retries
    pub stop_on_rate_limit: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            flush_interval: 100,
            dedup_scope: DedupScope::Global,
            retry_failed: false,
            record_details: false,
            unit_attempts: 1,
            stop_on_rate_limit: false,
        }
    }
}

impl HarvestOptions {
    /// Options handed to each unit's iterator
    pub fn iterator_options(&self) -> IteratorOptions {
        IteratorOptions {
            flush_interval: self.flush_interval,
            retry_failed: self.retry_failed,
            record_details: self.record_details,
        }
    }
}

/// A unit that failed after all its attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    /// The unit
    pub unit: UnitKey,
    /// Error class (see `Error::kind`)
    pub kind: String,
    /// Error message
    pub error: String,
    /// Attempts made in this run
    pub attempts: u32,
}

/// Outcome of a whole harvest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    /// Units required by the declarations
    pub required: usize,
    /// Units left after planning
    pub planned: usize,
    /// Units completed in this run
    pub completed_units: Vec<UnitKey>,
    /// Units that failed in this run
    pub failed_units: Vec<UnitFailure>,
    /// Planned units left for the next run, neither completed nor failed.
    /// Counts the unit cut short by an interrupt plus every unit not started.
    pub remaining: usize,
    /// Item counts over all units
    pub totals: RunSummary,
    /// The run stopped on an interrupt
    pub interrupted: bool,
}

impl HarvestReport {
    /// Check if every planned unit completed
    pub fn is_complete(&self) -> bool {
        self.completed_units.len() == self.planned
    }
}
