//! CSV parser for required-unit declarations
//!
//! Reads a sources file (`source,url`) and a partitions file
//! (`source,partition`). Column names are configurable; extra columns are
//! ignored, and rows with an empty source or value are skipped.

use crate::error::{Error, Result};
use crate::loader::types::{DeclarationColumns, Declarations};
use crate::planner::{PartitionDecl, SourceDecl};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use tracing::debug;

/// Normalize a source id: lowercase, spaces to underscores, apostrophes removed.
///
/// ```
/// use harvester::loader::normalize_source_id;
/// assert_eq!(normalize_source_id("Runner's World Half"), "runners_world_half");
/// ```
pub fn normalize_source_id(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(['\'', '\u{2019}'], "")
}

/// Check that a source id can be used as a unit id prefix
pub fn validate_source_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::invalid_value("source", "source id cannot be empty"));
    }
    if id.contains('/') {
        return Err(Error::invalid_value(
            "source",
            format!("source id '{id}' cannot contain '/'"),
        ));
    }
    Ok(())
}

/// Read source declarations from a CSV file
pub fn read_sources(
    path: impl AsRef<Path>,
    columns: &DeclarationColumns,
    normalize: bool,
) -> Result<Vec<SourceDecl>> {
    let pairs = read_pairs(path.as_ref(), &columns.source, &columns.locator, normalize)?;
    Ok(pairs
        .into_iter()
        .map(|(source, locator)| SourceDecl::new(source, locator))
        .collect())
}

/// Read partition declarations from a CSV file
pub fn read_partitions(
    path: impl AsRef<Path>,
    columns: &DeclarationColumns,
    normalize: bool,
) -> Result<Vec<PartitionDecl>> {
    let pairs = read_pairs(path.as_ref(), &columns.source, &columns.partition, normalize)?;
    Ok(pairs
        .into_iter()
        .map(|(source, partition)| PartitionDecl::new(source, partition))
        .collect())
}

/// Read both declaration files
pub fn load_declarations(
    sources_path: impl AsRef<Path>,
    partitions_path: impl AsRef<Path>,
    columns: &DeclarationColumns,
    normalize: bool,
) -> Result<Declarations> {
    let sources = read_sources(sources_path, columns, normalize)?;
    let partitions = read_partitions(partitions_path, columns, normalize)?;
    debug!(
        "Loaded {} sources and {} partitions",
        sources.len(),
        partitions.len()
    );
    Ok(Declarations {
        sources,
        partitions,
    })
}

/// Read `(source, value)` pairs from two named columns
fn read_pairs(
    path: &Path,
    source_column: &str,
    value_column: &str,
    normalize: bool,
) -> Result<Vec<(String, String)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            Error::config(format!(
                "Failed to read declarations '{}': {e}",
                path.display()
            ))
        })?;

    let headers = reader.headers()?.clone();
    let source_idx = column_index(&headers, source_column, path)?;
    let value_idx = column_index(&headers, value_column, path)?;

    let mut pairs = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let source = record.get(source_idx).unwrap_or("").trim();
        let value = record.get(value_idx).unwrap_or("").trim();

        if source.is_empty() || value.is_empty() {
            continue;
        }

        let source = if normalize {
            normalize_source_id(source)
        } else {
            source.to_string()
        };
        validate_source_id(&source).map_err(|e| {
            Error::config(format!("{} row {}: {e}", path.display(), row + 2))
        })?;

        pairs.push((source, value.to_string()));
    }

    Ok(pairs)
}

fn column_index(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| {
            Error::config(format!(
                "{}: missing column '{name}' (found: {})",
                path.display(),
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })
}
