//! Declaration types
//!
//! What a job declares it needs: sources with their locators, and the
//! partitions wanted from each.

use crate::planner::{self, PartitionDecl, SourceDecl, WorkUnit};
use serde::{Deserialize, Deserializer, Serialize};

/// Column names of the declaration CSV files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclarationColumns {
    /// Source id column (both files)
    pub source: String,
    /// Locator column (sources file)
    pub locator: String,
    /// Partition column (partitions file)
    pub partition: String,
}

impl Default for DeclarationColumns {
    fn default() -> Self {
        Self {
            source: "source".to_string(),
            locator: "url".to_string(),
            partition: "partition".to_string(),
        }
    }
}

/// One source declared inline in the job file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDecl {
    /// Source id
    pub source: String,
    /// URL template for the source
    pub locator: String,
    /// Partitions to harvest
    #[serde(default, deserialize_with = "scalar_strings")]
    pub partitions: Vec<String>,
}

/// Accept numbers and booleans as partition keys (`- 2024` in YAML)
fn scalar_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_yaml::Value>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|value| match value {
            serde_yaml::Value::String(s) => Ok(s),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "partition must be a scalar, got {other:?}"
            ))),
        })
        .collect()
}

/// Every declaration of a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    /// Declared sources in file order
    pub sources: Vec<SourceDecl>,
    /// Declared partitions in file order
    pub partitions: Vec<PartitionDecl>,
}

impl Declarations {
    /// Create empty declarations
    pub fn new() -> Self {
        Self::default()
    }

    /// Build declarations from inline units
    pub fn from_units(units: &[UnitDecl]) -> Self {
        let mut decls = Self::new();
        for unit in units {
            decls.sources.push(SourceDecl::new(&unit.source, &unit.locator));
            decls.partitions.extend(
                unit.partitions
                    .iter()
                    .map(|partition| PartitionDecl::new(&unit.source, partition)),
            );
        }
        decls
    }

    /// Append another set of declarations after this one
    pub fn extend(&mut self, other: Declarations) {
        self.sources.extend(other.sources);
        self.partitions.extend(other.partitions);
    }

    /// Check if nothing is declared
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Expand into the required work units
    pub fn required_units(&self) -> Vec<WorkUnit> {
        planner::required_units(&self.sources, &self.partitions)
    }
}
