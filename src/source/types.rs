//! Source types and traits
//!
//! Defines the page-level abstractions every remote endpoint adapter implements.

use crate::error::Result;
use crate::planner::WorkUnit;
use async_trait::async_trait;
use std::time::Duration;

/// Parameters of one page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number (as the endpoint counts them)
    pub page: u64,
    /// Item offset of the first item on this page
    pub offset: u64,
    /// Requested page size
    pub page_size: u32,
    /// Cursor for cursor-paginated endpoints
    pub cursor: Option<String>,
}

impl PageRequest {
    /// Create the request for the first page
    pub fn first(start_page: u64, page_size: u32) -> Self {
        Self {
            page: start_page,
            offset: 0,
            page_size,
            cursor: None,
        }
    }
}

/// One page returned by the endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Page<P> {
    /// Items in endpoint order
    pub items: Vec<P>,
    /// Total page count, when the endpoint reports one
    pub total_pages: Option<u64>,
    /// Cursor of the next page, for cursor pagination
    pub next_cursor: Option<String>,
    /// Explicit end marker, when the endpoint sends one
    pub is_last: Option<bool>,
}

impl<P> Page<P> {
    /// Create a page with only items
    pub fn new(items: Vec<P>) -> Self {
        Self {
            items,
            total_pages: None,
            next_cursor: None,
            is_last: None,
        }
    }

    /// Set the total page count
    #[must_use]
    pub fn with_total_pages(mut self, total: u64) -> Self {
        self.total_pages = Some(total);
        self
    }

    /// Set the next cursor
    #[must_use]
    pub fn with_next_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }

    /// Set the end marker
    #[must_use]
    pub fn with_is_last(mut self, is_last: bool) -> Self {
        self.is_last = Some(is_last);
        self
    }

    /// Number of items on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if this page has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of a single page request that did not fail at the transport level
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<P> {
    /// The page
    Page(Page<P>),
    /// The endpoint asked us to slow down; the same request should be retried
    RateLimited {
        /// Server-suggested wait, if any
        retry_after: Option<Duration>,
    },
}

/// A paginated remote endpoint.
///
/// Transport failures (connection errors, unexpected status codes, malformed
/// bodies) are returned as `Err` and are never retried by the source.
/// Rate limiting is an outcome, not an error.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Item type yielded by this endpoint
    type Item: Send;

    /// Request one page of one work unit
    async fn fetch_page(
        &self,
        unit: &WorkUnit,
        request: &PageRequest,
    ) -> Result<FetchOutcome<Self::Item>>;
}
