//! Scrape backend trait: the seam between the fast and heavy fetch paths.
//!
//! A backend fetches one URL and reports what came back. Any HTTP
//! response, including a 404 or 500, is `Ok`: the status is data for the
//! detectors. `Err` is reserved for attempts that never got a response.
//!
//! ```rust,ignore
//! use sitewatch::{HttpBackend, ScrapeBackend};
//!
//! let backend = HttpBackend::new();
//! let page = backend.fetch("https://example.com").await?;
//! println!("{} -> {}", page.url, page.status);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScrapeResult;
use crate::types::{
    ids::UrlId,
    snapshot::{Backend, ContentSnapshot, PageMetadata},
};

/// What a backend got back for one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    /// Requested URL
    pub url: String,

    /// URL after redirects, if it differs or is known
    pub final_url: Option<String>,

    /// HTTP status code
    pub status: u16,

    /// Extracted text (markdown or plain text, may be empty)
    pub text: String,

    /// Raw markup, when available
    pub markup: Option<String>,

    pub title: Option<String>,

    pub content_type: Option<String>,

    /// Parsed `Last-Modified` header
    pub last_modified: Option<DateTime<Utc>>,

    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    /// Create a 200 response with the given text.
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            final_url: None,
            status: 200,
            text: text.into(),
            markup: None,
            title: None,
            content_type: None,
            last_modified: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    pub fn with_final_url(mut self, final_url: impl Into<String>) -> Self {
        self.final_url = Some(final_url.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn metadata(&self) -> PageMetadata {
        PageMetadata {
            http_status: Some(self.status),
            final_url: self.final_url.clone(),
            title: self.title.clone(),
            content_type: self.content_type.clone(),
            last_modified: self.last_modified,
        }
    }

    /// Record this response as a snapshot.
    pub fn into_snapshot(self, url_id: UrlId, backend: Backend) -> ContentSnapshot {
        let metadata = self.metadata();
        ContentSnapshot::from_response(
            url_id,
            self.url,
            backend,
            self.text,
            self.markup,
            metadata,
            self.fetched_at,
        )
    }
}

/// A way of fetching a single page.
///
/// Implementations:
/// - `HttpBackend` - plain HTTP GET with HTML-to-text conversion (fast)
/// - `FirecrawlBackend` - Firecrawl browser rendering (heavy)
/// - `MockBackend` - canned responses for tests
///
/// Wrap URL-based backends in `GuardedBackend` before pointing them at
/// registry data.
#[async_trait]
pub trait ScrapeBackend: Send + Sync {
    /// Fetch one URL.
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedPage>;

    /// Backend name (for logging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<B: ScrapeBackend + ?Sized> ScrapeBackend for std::sync::Arc<B> {
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedPage> {
        (**self).fetch(url).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<B: ScrapeBackend + ?Sized> ScrapeBackend for Box<B> {
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedPage> {
        (**self).fetch(url).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_page_builder() {
        let page = FetchedPage::new("https://example.com", "Hello")
            .with_status(404)
            .with_title("Not Found")
            .with_final_url("https://example.com/404");

        assert!(!page.is_success());
        let metadata = page.metadata();
        assert_eq!(metadata.http_status, Some(404));
        assert_eq!(metadata.final_url.as_deref(), Some("https://example.com/404"));
    }

    #[test]
    fn test_into_snapshot_keeps_body() {
        let url_id = UrlId::new();
        let snapshot = FetchedPage::new("https://example.com", "We're hiring")
            .with_markup("<p>We're hiring</p>")
            .into_snapshot(url_id, Backend::Fast);

        assert_eq!(snapshot.url_id, url_id);
        assert!(snapshot.success);
        assert_eq!(snapshot.content, "We're hiring");
        assert_eq!(snapshot.backend, Backend::Fast);
    }
}
