//! Preventive request pacing
//!
//! Two independent throttles sit in front of every page request:
//! a fixed delay between successive pages of one fetch, and an optional
//! token-bucket ceiling (governor) shared by every fetch of a source.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Token bucket ceiling on requests per second
#[derive(Clone)]
pub struct RequestCeiling {
    limiter: Arc<DirectLimiter>,
}

impl RequestCeiling {
    /// Allow at most `requests_per_second` requests, no bursts.
    ///
    /// Returns `None` for zero, which means unlimited.
    pub fn per_second(requests_per_second: u32) -> Option<Self> {
        let rate = NonZeroU32::new(requests_per_second)?;
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
        Some(Self {
            limiter: Arc::new(Governor::direct(quota)),
        })
    }

    /// Wait until a request may be sent
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Check if a request may be sent right now (consumes a permit when it may)
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RequestCeiling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCeiling").finish()
    }
}

/// Pacing state for one fetch (one pass over a work unit's pages)
#[derive(Debug)]
pub struct RequestPacer {
    delay: Duration,
    ceiling: Option<RequestCeiling>,
    pages_started: u64,
}

impl RequestPacer {
    /// Create a pacer
    pub fn new(delay: Duration, ceiling: Option<RequestCeiling>) -> Self {
        Self {
            delay,
            ceiling,
            pages_started: 0,
        }
    }

    /// Called once before each new page; sleeps the fixed delay except before the first
    pub async fn before_page(&mut self) {
        if self.pages_started > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.pages_started += 1;
    }

    /// Called before every request, retries included
    pub async fn before_request(&self) {
        if let Some(ceiling) = &self.ceiling {
            ceiling.wait().await;
        }
    }

    /// Pages started so far
    pub fn pages_started(&self) -> u64 {
        self.pages_started
    }
}
