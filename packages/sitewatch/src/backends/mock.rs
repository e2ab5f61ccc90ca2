//! Mock backend for testing.
//!
//! Provides canned responses per URL and records every call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{ScrapeError, ScrapeResult};
use crate::traits::backend::{FetchedPage, ScrapeBackend};

/// What the mock answers for a URL.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// An HTTP response (any status)
    Page(FetchedPage),
    /// No response: connection refused, TLS failure, DNS failure...
    TransportError(String),
    /// The request timed out
    Timeout,
}

/// Mock scrape backend.
///
/// URLs without a configured reply fail with a transport error, the same
/// as an unreachable host.
///
/// # Example
///
/// ```rust
/// use sitewatch::backends::MockBackend;
/// use sitewatch::traits::backend::FetchedPage;
///
/// let mock = MockBackend::new()
///     .with_page(FetchedPage::new("https://example.com", "# Hello"))
///     .with_transport_error("https://gone.example", "dns error: failed to lookup address");
/// ```
#[derive(Default)]
pub struct MockBackend {
    name: String,
    replies: Arc<RwLock<HashMap<String, MockReply>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            ..Default::default()
        }
    }

    /// Name reported to logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reply for a URL, replacing any previous one.
    pub fn set_reply(&self, url: impl Into<String>, reply: MockReply) {
        self.replies.write().unwrap().insert(url.into(), reply);
    }

    /// Reply to the page's URL with the page.
    pub fn add_page(&self, page: FetchedPage) {
        self.set_reply(page.url.clone(), MockReply::Page(page));
    }

    pub fn with_page(self, page: FetchedPage) -> Self {
        self.add_page(page);
        self
    }

    pub fn with_pages(self, pages: impl IntoIterator<Item = FetchedPage>) -> Self {
        for page in pages {
            self.add_page(page);
        }
        self
    }

    pub fn with_transport_error(self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.set_reply(url, MockReply::TransportError(message.into()));
        self
    }

    pub fn with_timeout(self, url: impl Into<String>) -> Self {
        self.set_reply(url, MockReply::Timeout);
        self
    }

    /// Number of fetches so far.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// URLs fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

impl Clone for MockBackend {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            replies: Arc::clone(&self.replies),
            calls: Arc::clone(&self.calls),
        }
    }
}

#[async_trait]
impl ScrapeBackend for MockBackend {
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());

        let reply = self.replies.read().unwrap().get(url).cloned();
        match reply {
            Some(MockReply::Page(page)) => Ok(page),
            Some(MockReply::TransportError(message)) => Err(ScrapeError::http(message)),
            Some(MockReply::Timeout) => Err(ScrapeError::Timeout {
                url: url.to_string(),
            }),
            None => Err(ScrapeError::http(format!("connection refused: {}", url))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
