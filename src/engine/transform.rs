//! Default record transform for JSON items
//!
//! Derives the dedup key, filters items missing required fields, and
//! projects the payload that ends up in the output.

use crate::checkpoint::ItemKey;
use crate::output::OutputRecord;
use crate::planner::WorkUnit;
use crate::types::{JsonObject, JsonValue};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Turns raw JSON items into output records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordTransform {
    /// Fields forming the dedup key (names or JSON pointers); empty = whole item.
    /// Items missing a key field are keyed by the whole item.
    pub key_fields: Vec<String>,
    /// Items missing any of these (or holding null or "") are filtered out
    pub required_fields: Vec<String>,
    /// Fields kept in the payload; empty = keep the whole item
    pub fields: Vec<String>,
}

impl RecordTransform {
    /// Create a transform that keeps items whole
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key fields
    #[must_use]
    pub fn with_key_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the required fields
    #[must_use]
    pub fn with_required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the projected fields
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Dedup key of an item.
    ///
    /// Items with any key field missing or null are keyed by their whole
    /// value, so distinct items never share a key.
    pub fn key(&self, item: &JsonValue) -> JsonValue {
        let values: Option<Vec<&JsonValue>> = self
            .key_fields
            .iter()
            .map(|field| lookup(item, field).filter(|v| !v.is_null()))
            .collect();

        match values.as_deref() {
            None | Some([]) => item.clone(),
            Some([single]) => (*single).clone(),
            Some(values) => JsonValue::Array(values.iter().map(|v| (*v).clone()).collect()),
        }
    }

    /// Check if an item has every required field
    pub fn accepts(&self, item: &JsonValue) -> bool {
        self.required_fields
            .iter()
            .all(|field| match lookup(item, field) {
                None | Some(JsonValue::Null) => false,
                Some(JsonValue::String(s)) => !s.is_empty(),
                Some(_) => true,
            })
    }

    /// Payload kept in the output
    pub fn project(&self, item: &JsonValue) -> JsonValue {
        if self.fields.is_empty() {
            return item.clone();
        }

        let mut projected = JsonObject::new();
        for field in &self.fields {
            let value = lookup(item, field).cloned().unwrap_or(JsonValue::Null);
            projected.insert(output_name(field).to_string(), value);
        }
        JsonValue::Object(projected)
    }

    /// Build the output record for an item, or `None` when it is filtered out
    pub fn apply(&self, unit: &WorkUnit, item: &JsonValue) -> Option<OutputRecord> {
        if !self.accepts(item) {
            return None;
        }

        let payload = self.project(item).to_string();
        Some(
            OutputRecord::new(&unit.source_id, &unit.partition_key, payload)
                .with_item_key(self.key(item).encode())
                .with_harvested_at(Utc::now()),
        )
    }
}

/// Find a field by top-level name or JSON pointer
fn lookup<'v>(item: &'v JsonValue, field: &str) -> Option<&'v JsonValue> {
    if field.starts_with('/') {
        item.pointer(field)
    } else {
        item.get(field)
    }
}

/// Column name of a projected field (last pointer segment)
fn output_name(field: &str) -> &str {
    field.rsplit('/').next().unwrap_or(field)
}
