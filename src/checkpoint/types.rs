//! Checkpoint types
//!
//! These types are serialized to JSON and persisted between runs. The
//! checkpoint is the source of truth for dedup and resume: a key that has an
//! entry here has been handled and is not processed again.

use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Current on-disk format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Outcome recorded for one processed key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Processing returned a value (possibly empty)
    Success,
    /// Processing raised an error
    Failed,
}

/// Persisted record of one processed key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Outcome of processing
    pub status: EntryStatus,
    /// Result value on success (when enabled) or the error description on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<JsonValue>,
    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,
}

impl CheckpointEntry {
    /// Create an entry stamped with the current time
    pub fn new(status: EntryStatus, detail: Option<JsonValue>) -> Self {
        Self {
            status,
            detail,
            timestamp: Utc::now(),
        }
    }

    /// Check if this entry records a success
    pub fn is_success(&self) -> bool {
        self.status == EntryStatus::Success
    }

    /// Error description of a failed entry
    pub fn error_message(&self) -> Option<&str> {
        match (&self.status, &self.detail) {
            (EntryStatus::Failed, Some(JsonValue::String(msg))) => Some(msg),
            _ => None,
        }
    }
}

/// Progress of one work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Fetch started but has not finished; output for this unit may be partial
    InProgress,
    /// All pages fetched and all items handled
    Complete,
    /// Gave up on this unit in the last run
    Failed,
}

/// Ledger entry for one work unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEntry {
    /// Current status
    pub status: UnitStatus,
    /// Number of fetch attempts across all runs
    #[serde(default)]
    pub attempts: u32,
    /// Failure description, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

/// Full mapping of key to outcome for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// On-disk format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Per-key outcomes
    #[serde(default, serialize_with = "ordered")]
    entries: HashMap<String, CheckpointEntry>,

    /// Per-unit ledger
    #[serde(default, serialize_with = "ordered")]
    units: HashMap<String, UnitEntry>,
}

fn default_version() -> u32 {
    CHECKPOINT_VERSION
}

/// Serialize a map in key order so checkpoint files diff cleanly
fn ordered<S, V>(map: &HashMap<String, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    map.iter().collect::<BTreeMap<_, _>>().serialize(serializer)
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            entries: HashMap::new(),
            units: HashMap::new(),
        }
    }
}

impl Checkpoint {
    /// Create a new empty checkpoint
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a key has an entry
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Check if a key counts as done.
    ///
    /// With `retry_failed`, only successful entries count.
    pub fn is_done(&self, key: &str, retry_failed: bool) -> bool {
        match self.entries.get(key) {
            Some(entry) => entry.is_success() || !retry_failed,
            None => false,
        }
    }

    /// Get the entry for a key
    pub fn get(&self, key: &str) -> Option<&CheckpointEntry> {
        self.entries.get(key)
    }

    /// Record an outcome in memory (does not persist)
    pub fn record(&mut self, key: impl Into<String>, status: EntryStatus, detail: Option<JsonValue>) {
        self.entries
            .insert(key.into(), CheckpointEntry::new(status, detail));
    }

    /// Record a success
    pub fn record_success(&mut self, key: impl Into<String>, detail: Option<JsonValue>) {
        self.record(key, EntryStatus::Success, detail);
    }

    /// Record a failure with its error description
    pub fn record_failure(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.record(
            key,
            EntryStatus::Failed,
            Some(JsonValue::String(message.into())),
        );
    }

    /// Number of recorded keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no keys are recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CheckpointEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    // ------------------------------------------------------------------------
    // Unit ledger
    // ------------------------------------------------------------------------

    /// Set the status of a work unit.
    ///
    /// Moving a unit to `InProgress` counts as a new attempt.
    pub fn mark_unit(&mut self, unit_id: &str, status: UnitStatus, detail: Option<String>) {
        let entry = self
            .units
            .entry(unit_id.to_string())
            .or_insert_with(|| UnitEntry {
                status,
                attempts: 0,
                detail: None,
                updated_at: Utc::now(),
            });
        if status == UnitStatus::InProgress {
            entry.attempts += 1;
        }
        entry.status = status;
        entry.detail = detail;
        entry.updated_at = Utc::now();
    }

    /// Get the ledger entry for a unit
    pub fn unit(&self, unit_id: &str) -> Option<&UnitEntry> {
        self.units.get(unit_id)
    }

    /// Get the status of a unit
    pub fn unit_status(&self, unit_id: &str) -> Option<UnitStatus> {
        self.units.get(unit_id).map(|u| u.status)
    }

    /// Ids of all units with the given status
    pub fn units_with(&self, status: UnitStatus) -> impl Iterator<Item = &str> {
        self.units
            .iter()
            .filter(move |(_, u)| u.status == status)
            .map(|(id, _)| id.as_str())
    }

    /// Summarize the checkpoint for reporting
    pub fn summary(&self) -> CheckpointSummary {
        let mut summary = CheckpointSummary {
            entries: self.entries.len(),
            ..CheckpointSummary::default()
        };

        for (key, entry) in &self.entries {
            match entry.status {
                EntryStatus::Success => summary.succeeded += 1,
                EntryStatus::Failed => {
                    summary.failed += 1;
                    summary.failed_keys.push((
                        key.clone(),
                        entry.error_message().unwrap_or_default().to_string(),
                    ));
                }
            }
        }
        summary.failed_keys.sort();

        for (id, unit) in &self.units {
            match unit.status {
                UnitStatus::Complete => summary.units_complete += 1,
                UnitStatus::InProgress => summary.units_in_progress += 1,
                UnitStatus::Failed => {
                    summary.units_failed += 1;
                    summary
                        .failed_units
                        .push((id.clone(), unit.detail.clone().unwrap_or_default()));
                }
            }
        }
        summary.failed_units.sort();

        summary
    }
}

/// Counts over a checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckpointSummary {
    /// Total recorded keys
    pub entries: usize,
    /// Keys recorded as success
    pub succeeded: usize,
    /// Keys recorded as failed
    pub failed: usize,
    /// `(key, error)` for every failed key, sorted by key
    pub failed_keys: Vec<(String, String)>,
    /// Units marked complete
    pub units_complete: usize,
    /// Units left in progress
    pub units_in_progress: usize,
    /// Units marked failed
    pub units_failed: usize,
    /// `(unit, error)` for every failed unit, sorted by unit
    pub failed_units: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_default() {
        let checkpoint = Checkpoint::new();
        assert!(checkpoint.is_empty());
        assert_eq!(checkpoint.version, CHECKPOINT_VERSION);
    }

    #[test]
    fn test_record_and_contains() {
        let mut checkpoint = Checkpoint::new();
        assert!(!checkpoint.contains("a"));

        checkpoint.record_success("a", None);
        checkpoint.record_failure("b", "boom");

        assert!(checkpoint.contains("a"));
        assert!(checkpoint.contains("b"));
        assert_eq!(checkpoint.len(), 2);
        assert!(checkpoint.get("a").unwrap().is_success());
        assert_eq!(checkpoint.get("b").unwrap().error_message(), Some("boom"));
    }

    #[test]
    fn test_is_done_respects_retry_failed() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.record_success("ok", None);
        checkpoint.record_failure("bad", "boom");

        assert!(checkpoint.is_done("ok", false));
        assert!(checkpoint.is_done("bad", false));
        assert!(checkpoint.is_done("ok", true));
        assert!(!checkpoint.is_done("bad", true));
        assert!(!checkpoint.is_done("missing", false));
    }

    #[test]
    fn test_unit_ledger_attempts() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.mark_unit("boston/2024", UnitStatus::InProgress, None);
        checkpoint.mark_unit("boston/2024", UnitStatus::Failed, Some("429".into()));
        checkpoint.mark_unit("boston/2024", UnitStatus::InProgress, None);

        let unit = checkpoint.unit("boston/2024").unwrap();
        assert_eq!(unit.attempts, 2);
        assert_eq!(unit.status, UnitStatus::InProgress);
        assert!(unit.detail.is_none());
    }

    #[test]
    fn test_summary() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.record_success("a", Some(json!({"v": 1})));
        checkpoint.record_failure("c", "bad c");
        checkpoint.record_failure("b", "bad b");
        checkpoint.mark_unit("x/1", UnitStatus::Complete, None);
        checkpoint.mark_unit("x/2", UnitStatus::Failed, Some("HTTP 500".into()));

        let summary = checkpoint.summary();
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(
            summary.failed_keys,
            vec![
                ("b".to_string(), "bad b".to_string()),
                ("c".to_string(), "bad c".to_string())
            ]
        );
        assert_eq!(summary.units_complete, 1);
        assert_eq!(summary.units_failed, 1);
        assert_eq!(summary.failed_units[0].0, "x/2");
    }

    #[test]
    fn test_checkpoint_serialization() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.record_success("k1", None);
        checkpoint.record_failure("k2", "oops");
        checkpoint.mark_unit("s/p", UnitStatus::Complete, None);

        let json = serde_json::to_string(&checkpoint).unwrap();
        let restored: Checkpoint = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, checkpoint);
        assert_eq!(restored.unit_status("s/p"), Some(UnitStatus::Complete));
    }

    #[test]
    fn test_checkpoint_missing_sections_default() {
        let restored: Checkpoint = serde_json::from_str("{}").unwrap();
        assert!(restored.is_empty());
        assert_eq!(restored.version, CHECKPOINT_VERSION);
    }
}
