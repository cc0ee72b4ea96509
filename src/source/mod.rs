//! Paginated source module
//!
//! Abstracts a cursor/offset/page-number paginated remote endpoint.
//!
//! # Features
//!
//! - **Lazy streams**: one work unit becomes a `Stream` of items, fetched page by page
//! - **Backoff**: rate-limited requests are retried with constant, linear, or exponential delays
//! - **Pacing**: a fixed delay between pages plus an optional requests-per-second ceiling
//! - **Strategies**: page number, offset, and cursor pagination
//!
//! Transport errors are never retried here; retrying a failed unit is the
//! caller's decision, and item-level dedup makes such a retry cheap.

mod backoff;
mod pacing;
mod paginated;
mod paginator;
mod types;

pub use backoff::BackoffPolicy;
pub use pacing::{RequestCeiling, RequestPacer};
pub use paginated::{PaginatedSource, SourceConfig};
pub use paginator::{
    is_exhausted, CursorPaginator, NextPage, OffsetPaginator, PageNumberPaginator, Pagination,
    Paginator,
};
pub use types::{FetchOutcome, Page, PageFetcher, PageRequest};
