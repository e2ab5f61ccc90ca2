//! Rate-limited backend wrapper.
//!
//! Wraps any backend with a `governor` limiter so a batch never hits
//! sites (or the Firecrawl quota) faster than configured.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::ScrapeResult;
use crate::traits::backend::{FetchedPage, ScrapeBackend};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A backend wrapper that enforces a request rate.
pub struct RateLimitedBackend<B: ScrapeBackend> {
    inner: B,
    limiter: Arc<DefaultRateLimiter>,
}

impl<B: ScrapeBackend> RateLimitedBackend<B> {
    /// Limit to `requests_per_second` (at least 1).
    pub fn new(backend: B, requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(backend, Quota::per_second(rate))
    }

    /// Sustained rate with a burst allowance.
    pub fn with_burst(backend: B, requests_per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(backend, Quota::per_second(rate).allow_burst(burst))
    }

    pub fn with_quota(backend: B, quota: Quota) -> Self {
        Self {
            inner: backend,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

#[async_trait]
impl<B: ScrapeBackend> ScrapeBackend for RateLimitedBackend<B> {
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedPage> {
        self.limiter.until_ready().await;
        self.inner.fetch(url).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Extension trait for easy rate limiting.
pub trait BackendExt: ScrapeBackend + Sized {
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedBackend<Self> {
        RateLimitedBackend::new(self, requests_per_second)
    }
}

impl<B: ScrapeBackend + Sized> BackendExt for B {}
