//! Output record and scan types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted item as stored in the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Source the item was harvested from
    pub source_id: String,
    /// Partition the item belongs to
    pub partition_key: String,
    /// Canonical dedup key
    pub item_key: Option<String>,
    /// When the item was accepted
    pub harvested_at: Option<DateTime<Utc>>,
    /// JSON text of the (projected) item
    pub payload: String,
}

impl OutputRecord {
    /// Create a record with only the required columns
    pub fn new(
        source_id: impl Into<String>,
        partition_key: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            partition_key: partition_key.into(),
            item_key: None,
            harvested_at: None,
            payload: payload.into(),
        }
    }

    /// Set the item key
    #[must_use]
    pub fn with_item_key(mut self, key: impl Into<String>) -> Self {
        self.item_key = Some(key.into());
        self
    }

    /// Set the harvest timestamp
    #[must_use]
    pub fn with_harvested_at(mut self, at: DateTime<Utc>) -> Self {
        self.harvested_at = Some(at);
        self
    }
}

/// Columns used to find completed units in an existing output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanColumns {
    /// Column holding the source id
    pub source: String,
    /// Column holding the partition key
    pub partition: String,
    /// Keep only this many leading characters of the partition column
    /// (e.g. `4` turns a `2024-04-15` race date into the `2024` partition)
    pub partition_prefix: Option<usize>,
    /// Normalize source ids read from the output
    pub normalize_source: bool,
}

impl Default for ScanColumns {
    fn default() -> Self {
        Self {
            source: "source_id".to_string(),
            partition: "partition_key".to_string(),
            partition_prefix: None,
            normalize_source: false,
        }
    }
}

impl ScanColumns {
    /// Create scan columns with custom names
    pub fn new(source: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            partition: partition.into(),
            ..Self::default()
        }
    }

    /// Keep only a prefix of the partition column
    #[must_use]
    pub fn with_partition_prefix(mut self, len: usize) -> Self {
        self.partition_prefix = Some(len);
        self
    }

    /// Normalize scanned source ids
    #[must_use]
    pub fn with_normalized_source(mut self) -> Self {
        self.normalize_source = true;
        self
    }
}
