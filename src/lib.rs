// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Harvester
//!
//! A resumable batch harvester for paginated, rate-limited web APIs.
//!
//! ## Features
//!
//! - **Work Planning**: Required units minus units already in the output or
//!   marked complete in the checkpoint
//! - **Paginated Sources**: Page number, offset and cursor pagination with
//!   pacing and exponential backoff on HTTP 429
//! - **Checkpointed Iteration**: Each item is processed at most once across
//!   runs; failures are recorded, never fatal
//! - **Incremental Output**: Append-only CSV flushed together with the checkpoint
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use harvester::checkpoint::CheckpointStore;
//! use harvester::engine::Harvester;
//! use harvester::http::HttpPageFetcher;
//! use harvester::output::CsvSink;
//! use harvester::source::PaginatedSource;
//! use harvester::WorkUnit;
//!
//! #[tokio::main]
//! async fn main() -> harvester::Result<()> {
//!     let source = PaginatedSource::new(HttpPageFetcher::new()?);
//!     let harvester = Harvester::new(source, CheckpointStore::new("checkpoint.json"));
//!
//!     let units = vec![WorkUnit::new("boston", "2024", "https://api.example.com/{{ source }}")];
//!     let mut sink = CsvSink::open("results.csv")?;
//!     let report = harvester.run(&units, &Default::default(), &mut sink).await?;
//!     println!("{} units complete", report.completed_units.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Harvester                            │
//! │  plan(required, output scan, ledger) → units → run → report  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌────────────┬────────────────┴───┬──────────────┬─────────────┐
//! │  Planner   │  PaginatedSource   │  Iterator    │   Output    │
//! ├────────────┼────────────────────┼──────────────┼─────────────┤
//! │ Required   │ Page / Offset      │ Dedup        │ CSV sink    │
//! │ Completed  │ Cursor             │ Failures     │ Scan        │
//! │ Remaining  │ Delay / Backoff    │ Flush        │             │
//! └────────────┴────────────────────┴──────────────┴─────────────┘
//!                               │
//!                        CheckpointStore
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the harvester
pub mod error;

/// Common types and type aliases
pub mod types;

/// Checkpoint persistence
pub mod checkpoint;

/// Work unit planning
pub mod planner;

/// Paginated sources with pacing and backoff
pub mod source;

/// HTTP page fetcher
pub mod http;

/// Template interpolation
pub mod template;

/// Incremental output and completeness scan
pub mod output;

/// Declaration loading
pub mod loader;

/// Checkpointed iteration and job orchestration
pub mod engine;

/// Job configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, CheckpointStore, ItemKey};
pub use config::HarvestConfig;
pub use engine::{CheckpointIterator, Harvester, HarvestReport, Interrupt, RunSummary};
pub use planner::{UnitKey, WorkUnit};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
