//! Planner types
//!
//! Work units and the declarations they are built from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a work unit: source plus partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    /// Source identifier (e.g., a race slug)
    pub source_id: String,
    /// Partition within the source (e.g., a year)
    pub partition_key: String,
}

impl UnitKey {
    /// Create a new unit key
    pub fn new(source_id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            partition_key: partition_key.into(),
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_id, self.partition_key)
    }
}

/// One logical fetch target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Source identifier
    pub source_id: String,
    /// Partition key
    pub partition_key: String,
    /// Where to fetch from (a URL template)
    pub origin_locator: String,
}

impl WorkUnit {
    /// Create a new work unit
    pub fn new(
        source_id: impl Into<String>,
        partition_key: impl Into<String>,
        origin_locator: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            partition_key: partition_key.into(),
            origin_locator: origin_locator.into(),
        }
    }

    /// Identity of this unit
    pub fn key(&self) -> UnitKey {
        UnitKey::new(&self.source_id, &self.partition_key)
    }

    /// Display id, `source/partition`
    pub fn id(&self) -> String {
        self.key().to_string()
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_id, self.partition_key)
    }
}

/// A declared source and where to fetch it from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDecl {
    /// Source identifier
    pub source_id: String,
    /// URL template for this source
    pub origin_locator: String,
}

impl SourceDecl {
    /// Create a new source declaration
    pub fn new(source_id: impl Into<String>, origin_locator: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            origin_locator: origin_locator.into(),
        }
    }
}

/// A wanted partition of a declared source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDecl {
    /// Source identifier
    pub source_id: String,
    /// Partition key
    pub partition_key: String,
}

impl PartitionDecl {
    /// Create a new partition declaration
    pub fn new(source_id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            partition_key: partition_key.into(),
        }
    }
}
