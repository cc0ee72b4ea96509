//! Common types used throughout the harvester
//!
//! This module contains shared type definitions, type aliases,
//! and small enums used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Backoff Type
// ============================================================================

/// Backoff strategy applied between retries of a rate-limited request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Same delay every time
    Constant,
    /// Delay grows linearly: base, 2*base, 3*base, ...
    Linear,
    /// Delay doubles: base, 2*base, 4*base, ...
    #[default]
    Exponential,
}

// ============================================================================
// Dedup Scope
// ============================================================================

/// How far a dedup key reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// One key space for the whole job: an item seen under any unit is skipped everywhere
    #[default]
    Global,
    /// Keys are namespaced by work unit, so the same item may be accepted once per unit
    PerUnit,
}

// ============================================================================
// Pagination Kind
// ============================================================================

/// Pagination style of the remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKind {
    /// `?page=N&limit=M`, pages numbered from `start_page`
    #[default]
    PageNumber,
    /// `?offset=N&limit=M`
    Offset,
    /// `?cursor=...&limit=M`, next cursor taken from the response
    Cursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(BackoffType::default(), BackoffType::Exponential);
        assert_eq!(DedupScope::default(), DedupScope::Global);
        assert_eq!(PaginationKind::default(), PaginationKind::PageNumber);
    }

    #[test]
    fn test_serde_names() {
        let scope: DedupScope = serde_yaml::from_str("per_unit").unwrap();
        assert_eq!(scope, DedupScope::PerUnit);

        let kind: PaginationKind = serde_yaml::from_str("offset").unwrap();
        assert_eq!(kind, PaginationKind::Offset);

        assert_eq!(
            serde_json::to_string(&BackoffType::Linear).unwrap(),
            "\"linear\""
        );
    }
}

// ============================================================================
// Interrupt
// ============================================================================

#[derive(Debug, Default)]
struct InterruptState {
    triggered: AtomicBool,
    notify: Notify,
}

/// Cooperative stop signal, checked between items and raced against waits
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<InterruptState>);

impl Interrupt {
    /// Create an untriggered interrupt
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake every pending wait
    pub fn trigger(&self) {
        self.0.triggered.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    /// Check if a stop was requested
    pub fn is_triggered(&self) -> bool {
        self.0.triggered.load(Ordering::SeqCst)
    }

    /// Wait until a stop is requested
    pub async fn triggered(&self) {
        loop {
            // Registered before the check, so a trigger in between is not missed
            let notified = self.0.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `delay`; returns false if the interrupt fired first
    pub async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            () = self.triggered() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}
