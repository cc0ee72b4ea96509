//! Completeness scan over an existing output file

use super::types::ScanColumns;
use crate::error::{Error, Result};
use crate::loader::normalize_source_id;
use crate::planner::UnitKey;
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Distinct `(source, partition)` pairs present in a CSV output.
///
/// A missing or empty file yields an empty set. Rows with an empty source
/// or partition are ignored.
pub fn scan_completed_units(path: &Path, columns: &ScanColumns) -> Result<HashSet<UnitKey>> {
    let mut units = HashSet::new();

    if !path.exists() {
        debug!("No output at {}, nothing completed yet", path.display());
        return Ok(units);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(units);
    }

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| {
                Error::output(format!(
                    "{}: missing column '{name}'",
                    path.display()
                ))
            })
    };
    let source_idx = position(&columns.source)?;
    let partition_idx = position(&columns.partition)?;

    for record in reader.records() {
        let record = record?;

        let source = record.get(source_idx).unwrap_or("").trim();
        let partition = record.get(partition_idx).unwrap_or("").trim();
        let partition = match columns.partition_prefix {
            Some(len) => partition.get(..len).unwrap_or(""),
            None => partition,
        };

        if source.is_empty() || partition.is_empty() {
            continue;
        }

        let source = if columns.normalize_source {
            normalize_source_id(source)
        } else {
            source.to_string()
        };
        units.insert(UnitKey::new(source, partition));
    }

    debug!(
        "Scanned {}: {} completed units",
        path.display(),
        units.len()
    );
    Ok(units)
}
