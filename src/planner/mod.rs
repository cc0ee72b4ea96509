//! Work planning
//!
//! Computes which work units still need fetching.
//!
//! # Overview
//!
//! - `required_units` expands source and partition declarations into work units
//! - `completed_units` combines the output scan with the checkpoint's unit ledger
//! - `plan` returns required minus completed, in declared order
//!
//! The planner only reads the output; it never modifies it.

mod types;

pub use types::{PartitionDecl, SourceDecl, UnitKey, WorkUnit};

use crate::checkpoint::{Checkpoint, UnitStatus};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Expand declarations into the ordered list of required work units.
///
/// Units follow the order of `partitions`. Partitions of undeclared sources
/// are dropped with a warning; repeated `(source, partition)` pairs keep the
/// first occurrence.
pub fn required_units(sources: &[SourceDecl], partitions: &[PartitionDecl]) -> Vec<WorkUnit> {
    let mut locators: HashMap<&str, &str> = HashMap::new();
    for source in sources {
        locators
            .entry(source.source_id.as_str())
            .or_insert(source.origin_locator.as_str());
    }

    let mut seen = HashSet::new();
    let mut units = Vec::with_capacity(partitions.len());

    for partition in partitions {
        let Some(locator) = locators.get(partition.source_id.as_str()) else {
            warn!(
                "Partition {}/{} has no declared source, skipping",
                partition.source_id, partition.partition_key
            );
            continue;
        };

        let unit = WorkUnit::new(&partition.source_id, &partition.partition_key, *locator);
        if seen.insert(unit.key()) {
            units.push(unit);
        }
    }

    units
}

/// Units that count as done.
///
/// Starts from what the output scan found, adds units the ledger marks
/// complete (a unit with no data leaves no rows), and removes units the
/// ledger marks in progress or failed (their rows may be partial).
pub fn completed_units(output_units: &HashSet<UnitKey>, checkpoint: &Checkpoint) -> HashSet<UnitKey> {
    let mut completed: HashSet<UnitKey> = output_units.clone();

    let ledger_ids: HashSet<&str> = checkpoint.units_with(UnitStatus::Complete).collect();
    let unfinished: HashSet<&str> = checkpoint
        .units_with(UnitStatus::InProgress)
        .chain(checkpoint.units_with(UnitStatus::Failed))
        .collect();

    completed.retain(|key| !unfinished.contains(key.to_string().as_str()));

    for id in ledger_ids {
        if let Some((source, partition)) = id.split_once('/') {
            completed.insert(UnitKey::new(source, partition));
        }
    }

    completed
}

/// Required units minus completed units, in the original declared order
pub fn plan(required: &[WorkUnit], completed: &HashSet<UnitKey>) -> Vec<WorkUnit> {
    required
        .iter()
        .filter(|unit| !completed.contains(&unit.key()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests;
