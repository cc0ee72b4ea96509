//! Pagination strategies
//!
//! Each strategy computes the next page request from the current one and the
//! page it returned, or decides that the data is exhausted.

use super::types::{Page, PageRequest};
use crate::types::PaginationKind;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available
    Continue(PageRequest),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// A pagination strategy
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Request for the first page
    fn first_request(&self, page_size: u32) -> PageRequest;

    /// Request following `current`, given the page it returned
    fn next_request<P>(&self, current: &PageRequest, page: &Page<P>) -> NextPage;
}

/// End-of-data signals shared by every strategy: an empty page, a short page,
/// an explicit end marker, or a reached total page count.
pub fn is_exhausted<P>(request: &PageRequest, page: &Page<P>, pages_seen: u64) -> bool {
    if page.is_empty() || page.len() < request.page_size as usize {
        return true;
    }
    if page.is_last == Some(true) {
        return true;
    }
    page.total_pages.is_some_and(|total| pages_seen >= total)
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination (`?page=N&limit=M`)
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    /// First page number (usually 0 or 1)
    pub start_page: u64,
}

impl PageNumberPaginator {
    /// Create a new page number paginator
    pub fn new(start_page: u64) -> Self {
        Self { start_page }
    }
}

impl Default for PageNumberPaginator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Paginator for PageNumberPaginator {
    fn first_request(&self, page_size: u32) -> PageRequest {
        PageRequest::first(self.start_page, page_size)
    }

    fn next_request<P>(&self, current: &PageRequest, page: &Page<P>) -> NextPage {
        let pages_seen = current.page - self.start_page + 1;
        if is_exhausted(current, page, pages_seen) {
            return NextPage::Done;
        }

        NextPage::Continue(PageRequest {
            page: current.page + 1,
            offset: current.offset + page.len() as u64,
            page_size: current.page_size,
            cursor: None,
        })
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination (`?offset=N&limit=M`)
#[derive(Debug, Clone, Default)]
pub struct OffsetPaginator;

impl Paginator for OffsetPaginator {
    fn first_request(&self, page_size: u32) -> PageRequest {
        PageRequest::first(1, page_size)
    }

    fn next_request<P>(&self, current: &PageRequest, page: &Page<P>) -> NextPage {
        if is_exhausted(current, page, current.page) {
            return NextPage::Done;
        }

        NextPage::Continue(PageRequest {
            page: current.page + 1,
            offset: current.offset + page.len() as u64,
            page_size: current.page_size,
            cursor: None,
        })
    }
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor-based pagination; stops when the endpoint stops returning a cursor
#[derive(Debug, Clone, Default)]
pub struct CursorPaginator;

impl Paginator for CursorPaginator {
    fn first_request(&self, page_size: u32) -> PageRequest {
        PageRequest::first(1, page_size)
    }

    fn next_request<P>(&self, current: &PageRequest, page: &Page<P>) -> NextPage {
        if is_exhausted(current, page, current.page) {
            return NextPage::Done;
        }

        match page.next_cursor.as_deref() {
            Some(cursor) if !cursor.is_empty() => NextPage::Continue(PageRequest {
                page: current.page + 1,
                offset: current.offset + page.len() as u64,
                page_size: current.page_size,
                cursor: Some(cursor.to_string()),
            }),
            _ => NextPage::Done,
        }
    }
}

// ============================================================================
// Strategy selection
// ============================================================================

/// Any of the built-in strategies
#[derive(Debug, Clone)]
pub enum Pagination {
    /// Page numbers
    PageNumber(PageNumberPaginator),
    /// Offsets
    Offset(OffsetPaginator),
    /// Cursors
    Cursor(CursorPaginator),
}

impl Pagination {
    /// Build a strategy from its kind
    pub fn from_kind(kind: PaginationKind, start_page: u64) -> Self {
        match kind {
            PaginationKind::PageNumber => Self::PageNumber(PageNumberPaginator::new(start_page)),
            PaginationKind::Offset => Self::Offset(OffsetPaginator),
            PaginationKind::Cursor => Self::Cursor(CursorPaginator),
        }
    }

    /// Request for the first page
    pub fn first_request(&self, page_size: u32) -> PageRequest {
        match self {
            Self::PageNumber(p) => p.first_request(page_size),
            Self::Offset(p) => p.first_request(page_size),
            Self::Cursor(p) => p.first_request(page_size),
        }
    }

    /// Request following `current`
    pub fn next_request<P>(&self, current: &PageRequest, page: &Page<P>) -> NextPage {
        match self {
            Self::PageNumber(p) => p.next_request(current, page),
            Self::Offset(p) => p.next_request(current, page),
            Self::Cursor(p) => p.next_request(current, page),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::PageNumber(PageNumberPaginator::default())
    }
}
