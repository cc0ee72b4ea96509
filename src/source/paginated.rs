//! Paginated source
//!
//! Turns one work unit into a lazy, finite stream of items by requesting
//! pages until the endpoint signals the end.

use super::backoff::BackoffPolicy;
use super::pacing::{RequestCeiling, RequestPacer};
use super::paginator::{NextPage, Pagination};
use super::types::{FetchOutcome, Page, PageFetcher, PageRequest};
use crate::error::{Error, Result};
use crate::planner::WorkUnit;
use crate::types::Interrupt;
use futures::stream::{self, LocalBoxStream, StreamExt, TryStreamExt};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for a paginated source
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Largest page size the endpoint accepts
    pub max_page_size: u32,
    /// Fixed delay between successive page requests of one fetch
    pub request_delay: Duration,
    /// Optional ceiling on requests per second across all fetches
    pub requests_per_second: Option<u32>,
    /// Stop after this many pages per fetch (`None` = unlimited)
    pub max_pages: Option<u64>,
    /// Retry policy for rate-limited requests
    pub backoff: BackoffPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            request_delay: Duration::from_millis(500),
            requests_per_second: None,
            max_pages: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SourceConfig {
    /// Create a new source config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum page size
    #[must_use]
    pub fn with_max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the inter-request delay
    #[must_use]
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Set a requests-per-second ceiling
    #[must_use]
    pub fn with_requests_per_second(mut self, rps: Option<u32>) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Set the page limit per fetch
    #[must_use]
    pub fn with_max_pages(mut self, max: Option<u64>) -> Self {
        self.max_pages = max;
        self
    }

    /// Set the backoff policy
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// State carried between pages of one fetch
struct FetchState {
    next: Option<PageRequest>,
    pacer: RequestPacer,
    pages: u64,
}

/// A paginated remote endpoint with backoff and pacing
pub struct PaginatedSource<F> {
    fetcher: F,
    pagination: Pagination,
    config: SourceConfig,
    ceiling: Option<RequestCeiling>,
    interrupt: Interrupt,
}

impl<F: PageFetcher> PaginatedSource<F> {
    /// Create a source with default configuration and page-number pagination
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            pagination: Pagination::default(),
            config: SourceConfig::default(),
            ceiling: None,
            interrupt: Interrupt::new(),
        }
    }

    /// Set the source configuration
    #[must_use]
    pub fn with_config(mut self, config: SourceConfig) -> Self {
        self.ceiling = config
            .requests_per_second
            .and_then(RequestCeiling::per_second);
        self.config = config;
        self
    }

    /// Set the pagination strategy
    #[must_use]
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// End fetches cleanly once `interrupt` is triggered, even mid-backoff
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Get the underlying fetcher
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Page size actually requested for a caller's requested size
    pub fn effective_page_size(&self, requested: u32) -> u32 {
        requested.clamp(1, self.config.max_page_size.max(1))
    }

    /// Stream every item of `unit`, in endpoint order.
    ///
    /// The stream is lazy and starts from the first page on every call. A
    /// transport error or exhausted rate-limit retries end the stream with
    /// that error as its last item. An interrupt ends it early without error.
    pub fn fetch<'a>(
        &'a self,
        unit: &'a WorkUnit,
        page_size: u32,
    ) -> LocalBoxStream<'a, Result<F::Item>> {
        let page_size = self.effective_page_size(page_size);
        debug!("Fetching {unit} with page size {page_size}");

        let state = FetchState {
            next: Some(self.pagination.first_request(page_size)),
            pacer: RequestPacer::new(self.config.request_delay, self.ceiling.clone()),
            pages: 0,
        };

        stream::try_unfold(state, move |mut state| async move {
            let Some(request) = state.next.take() else {
                return Ok::<_, Error>(None);
            };

            let Some(page) = self.fetch_page(unit, &request, &mut state.pacer).await? else {
                debug!("Fetch of {unit} interrupted before page {}", request.page);
                return Ok(None);
            };
            state.pages += 1;
            debug!(
                "Fetched {unit} page {}: {} items",
                request.page,
                page.len()
            );

            state.next = match self.pagination.next_request(&request, &page) {
                NextPage::Continue(next)
                    if self.config.max_pages.map_or(true, |max| state.pages < max) =>
                {
                    Some(next)
                }
                NextPage::Continue(_) => {
                    warn!(
                        "Stopping {unit} after {} pages (max_pages reached)",
                        state.pages
                    );
                    None
                }
                NextPage::Done => None,
            };

            Ok(Some((page.items, state)))
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, Error>)))
        .try_flatten()
        .boxed_local()
    }

    /// Request one page, retrying the same request while rate limited.
    ///
    /// Returns `None` when the interrupt fires before the page is fetched.
    async fn fetch_page(
        &self,
        unit: &WorkUnit,
        request: &PageRequest,
        pacer: &mut RequestPacer,
    ) -> Result<Option<Page<F::Item>>> {
        pacer.before_page().await;

        let policy = &self.config.backoff;
        let mut attempt: u32 = 0;

        loop {
            pacer.before_request().await;
            if self.interrupt.is_triggered() {
                return Ok(None);
            }

            match self.fetcher.fetch_page(unit, request).await? {
                FetchOutcome::Page(page) => return Ok(Some(page)),
                FetchOutcome::RateLimited { retry_after } => {
                    attempt += 1;
                    if attempt >= policy.max_attempts {
                        warn!(
                            "Rate limited on {unit} page {}, giving up after {attempt} attempts",
                            request.page
                        );
                        return Err(Error::RateLimitExceeded { attempts: attempt });
                    }

                    let delay = policy.delay(attempt - 1);
                    warn!(
                        "Rate limited (429) on {unit} page {}, attempt {attempt}/{}, waiting {delay:?} (server suggested {retry_after:?})",
                        request.page,
                        policy.max_attempts,
                    );
                    if !self.interrupt.sleep(delay).await {
                        return Ok(None);
                    }
                }
            }
        }
    }
}

impl<F> std::fmt::Debug for PaginatedSource<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedSource")
            .field("pagination", &self.pagination)
            .field("config", &self.config)
            .field("has_ceiling", &self.ceiling.is_some())
            .finish_non_exhaustive()
    }
}
