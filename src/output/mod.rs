//! Output module
//!
//! Handles the durable record store that accepted items are appended to.
//!
//! # Overview
//!
//! This module provides:
//! - `RecordSink` - The incremental sink seam used by the iterator
//! - `CsvSink` - Append-only CSV output with durable flushes
//! - `MemorySink` - In-memory sink for embedding and tests
//! - `scan_completed_units` - Recovers which units an existing output already holds

mod scan;
mod types;
mod writer;

pub use scan::scan_completed_units;
pub use types::{OutputRecord, ScanColumns};
pub use writer::{CsvSink, MemorySink, RecordSink};
