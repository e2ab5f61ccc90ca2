//! Adaptive scraping: fast backend first, heavy backend once on anything
//! short of usable content.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::pipeline::validator::{ContentValidator, ContentVerdict};
use crate::traits::backend::ScrapeBackend;
use crate::types::{
    ids::UrlId,
    snapshot::{Backend, ContentSnapshot},
    target::UrlRecord,
};

/// Every attempt made for one URL in one pass.
///
/// Holds one snapshot per backend call (one or two). All of them are
/// persisted; `effective()` picks the one the detectors see.
#[derive(Debug, Clone)]
pub struct ScrapeAttempt {
    url_id: UrlId,
    snapshots: Vec<ContentSnapshot>,
}

impl ScrapeAttempt {
    fn first(snapshot: ContentSnapshot) -> Self {
        Self {
            url_id: snapshot.url_id,
            snapshots: vec![snapshot],
        }
    }

    fn push(&mut self, snapshot: ContentSnapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn url_id(&self) -> UrlId {
        self.url_id
    }

    /// Snapshots in attempt order.
    pub fn snapshots(&self) -> &[ContentSnapshot] {
        &self.snapshots
    }

    pub fn into_snapshots(self) -> Vec<ContentSnapshot> {
        self.snapshots
    }

    /// The most informative snapshot: usable content over blank content
    /// over an error response over no response. Later attempts win ties.
    pub fn effective(&self) -> &ContentSnapshot {
        let mut best = &self.snapshots[0];
        let mut best_rank = ContentValidator::classify(best).rank();
        for snapshot in &self.snapshots[1..] {
            let rank = ContentValidator::classify(snapshot).rank();
            if rank >= best_rank {
                best = snapshot;
                best_rank = rank;
            }
        }
        best
    }

    pub fn verdict(&self) -> ContentVerdict {
        ContentValidator::classify(self.effective())
    }

    /// Whether any backend got an HTTP response.
    pub fn got_response(&self) -> bool {
        self.snapshots.iter().any(ContentSnapshot::got_response)
    }

    pub fn used_heavy(&self) -> bool {
        self.snapshots.iter().any(|s| s.backend == Backend::Heavy)
    }
}

/// Fast-then-heavy scraper.
///
/// # Example
///
/// ```rust,ignore
/// let scraper = AdaptiveScraper::new(HttpBackend::new()?)
///     .with_heavy(FirecrawlBackend::new(api_key)?);
/// let attempt = scraper.scrape(&url_record).await;
/// ```
pub struct AdaptiveScraper {
    fast: Box<dyn ScrapeBackend>,
    heavy: Option<Box<dyn ScrapeBackend>>,
}

impl AdaptiveScraper {
    /// Scraper with only the fast backend.
    pub fn new(fast: impl ScrapeBackend + 'static) -> Self {
        Self {
            fast: Box::new(fast),
            heavy: None,
        }
    }

    /// Add the heavy backend used for retries.
    pub fn with_heavy(mut self, heavy: impl ScrapeBackend + 'static) -> Self {
        self.heavy = Some(Box::new(heavy));
        self
    }

    pub fn has_heavy(&self) -> bool {
        self.heavy.is_some()
    }

    /// Scrape one URL. Never fails: errors end up in snapshots.
    pub async fn scrape(&self, record: &UrlRecord) -> ScrapeAttempt {
        let first = fetch_snapshot(self.fast.as_ref(), record, Backend::Fast).await;
        let verdict = ContentValidator::classify(&first);
        log_verdict(record, Backend::Fast, &verdict);

        let mut attempt = ScrapeAttempt::first(first);
        if verdict.is_usable() {
            return attempt;
        }

        let Some(heavy) = &self.heavy else {
            debug!(url = %record.url, "No heavy backend configured, keeping fast result");
            return attempt;
        };

        info!(url = %record.url, backend = heavy.name(), "Retrying with heavy backend");
        let retry = fetch_snapshot(heavy.as_ref(), record, Backend::Heavy).await;
        log_verdict(record, Backend::Heavy, &ContentValidator::classify(&retry));
        attempt.push(retry);
        attempt
    }
}

async fn fetch_snapshot(
    backend: &dyn ScrapeBackend,
    record: &UrlRecord,
    kind: Backend,
) -> ContentSnapshot {
    match backend.fetch(&record.url).await {
        Ok(page) => page.into_snapshot(record.id, kind),
        Err(e) => ContentSnapshot::from_failure(
            record.id,
            record.url.clone(),
            kind,
            error_chain(&e),
            Utc::now(),
        ),
    }
}

fn log_verdict(record: &UrlRecord, backend: Backend, verdict: &ContentVerdict) {
    match verdict {
        ContentVerdict::Usable => {
            debug!(url = %record.url, backend = %backend, "Usable content")
        }
        ContentVerdict::Empty { markup_present } => info!(
            url = %record.url,
            backend = %backend,
            markup_present,
            "Empty content"
        ),
        ContentVerdict::HttpFailure { status } => warn!(
            url = %record.url,
            backend = %backend,
            status,
            "HTTP error response"
        ),
        ContentVerdict::TransportFailure { error } => warn!(
            url = %record.url,
            backend = %backend,
            error = %error,
            "Fetch failed"
        ),
    }
}

/// Render an error with its sources, so that e.g. a DNS failure buried
/// under a reqwest connect error stays visible in the snapshot.
fn error_chain(err: &ScrapeError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
