//! Scrape backend implementations.
//!
//! # Available Backends
//!
//! - `HttpBackend` - plain HTTP fetch (fast path)
//! - `FirecrawlBackend` - browser rendering via Firecrawl (heavy path)
//! - `MockBackend` - for testing
//!
//! Wrappers: `GuardedBackend` (SSRF protection) and `RateLimitedBackend`.
//!
//! # Example
//!
//! ```rust,ignore
//! use sitewatch::backends::{BackendExt, GuardedBackend, HttpBackend};
//!
//! let fast = GuardedBackend::new(HttpBackend::new()?).rate_limited(2);
//! ```

mod firecrawl;
mod guard;
mod http;
mod mock;
mod rate_limited;

pub use firecrawl::FirecrawlBackend;
pub use guard::{GuardedBackend, UrlGuard};
pub use http::{html_to_text, HttpBackend};
pub use mock::{MockBackend, MockReply};
pub use rate_limited::{BackendExt, RateLimitedBackend};

// Re-export from traits for convenience
pub use crate::traits::backend::{FetchedPage, ScrapeBackend};
