//! HTTP fetcher module
//!
//! Provides the reqwest-based `PageFetcher` for JSON endpoints.
//!
//! # Features
//!
//! - **Templated locators**: `{{ source }}` and `{{ partition }}` in URLs and query parameters
//! - **Pagination parameters**: page number, offset or cursor, with configurable names
//! - **Rate-limit signal**: HTTP 429 becomes `FetchOutcome::RateLimited`
//! - **JSON pointers**: records, total pages, next cursor, has-more flag

mod client;

pub use client::{HttpFetcherConfig, HttpFetcherConfigBuilder, HttpPageFetcher, PaginationParams};

#[cfg(test)]
mod tests;
