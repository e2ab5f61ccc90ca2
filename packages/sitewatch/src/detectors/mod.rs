//! Signal detectors.
//!
//! Every detector is a pure function of a [`PageView`]: no I/O, no clock
//! reads, no shared state. A detector that finds nothing returns an empty
//! list; malformed input is never an error.
//!
//! `DetectorSet::run` always runs the empty-content detector first.
//! Detectors that need text are skipped when the page has none.

mod acquisition;
mod dead_website;
mod empty_content;
mod operational;
mod staleness;

pub use acquisition::{registrable_domain, AcquisitionDetector};
pub use dead_website::{detect_all_dead, DeadWebsiteDetector};
pub use empty_content::EmptyContentDetector;
pub use operational::OperationalDetector;
pub use staleness::StalenessDetector;

use chrono::{DateTime, Utc};

use crate::pipeline::fallback::HistoricalContent;
use crate::types::{
    config::DetectorConfig,
    signal::{Signal, SignalType},
    snapshot::{is_blank, ContentSnapshot, PageMetadata},
    target::UrlRole,
};

/// Where the text a detector sees came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Fresh,
    Historical,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Fresh => "fresh",
            ContentSource::Historical => "historical",
        }
    }
}

/// Everything a detector may look at for one URL.
#[derive(Debug, Clone)]
pub struct PageView<'a> {
    pub url: &'a str,
    pub role: UrlRole,
    pub text: &'a str,
    pub markup: Option<&'a str>,
    pub metadata: &'a PageMetadata,

    /// A 2xx response was received
    pub succeeded: bool,

    pub error: Option<&'a str>,

    /// Reference time for "recent" and "stale" judgements
    pub observed_at: DateTime<Utc>,

    pub content_source: ContentSource,
}

impl<'a> PageView<'a> {
    /// View a fresh snapshot.
    pub fn from_snapshot(snapshot: &'a ContentSnapshot, role: UrlRole) -> Self {
        Self {
            url: &snapshot.url,
            role,
            text: &snapshot.content,
            markup: snapshot.markup.as_deref(),
            metadata: &snapshot.metadata,
            succeeded: snapshot.success,
            error: snapshot.error.as_deref(),
            observed_at: snapshot.captured_at,
            content_source: ContentSource::Fresh,
        }
    }

    /// Swap in stored content in place of a blank fresh fetch.
    pub fn with_historical(mut self, historical: &'a HistoricalContent) -> Self {
        self.text = &historical.content;
        self.markup = historical.markup.as_deref();
        self.content_source = ContentSource::Historical;
        self
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    pub fn has_text(&self) -> bool {
        !is_blank(self.text)
    }

    pub fn has_markup(&self) -> bool {
        self.markup.map(|m| !is_blank(m)).unwrap_or(false)
    }

    /// A signal stamped with this page's URL and observation time.
    pub fn signal(&self, signal_type: SignalType, confidence: f32, description: impl Into<String>) -> Signal {
        Signal::new(signal_type, confidence, description)
            .with_url(self.url)
            .with_detected_at(self.observed_at)
    }
}

/// A pure signal detector.
pub trait Detector: Send + Sync {
    /// Detector name (for logging).
    fn name(&self) -> &'static str;

    /// Whether the detector is skipped for pages with blank text.
    fn requires_content(&self) -> bool {
        true
    }

    fn detect(&self, page: &PageView<'_>) -> Vec<Signal>;
}

/// The ordered set of detectors run on each URL.
pub struct DetectorSet {
    empty: EmptyContentDetector,
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSet {
    /// The five standard detectors.
    pub fn standard(config: &DetectorConfig) -> Self {
        Self {
            empty: EmptyContentDetector::new(config),
            detectors: vec![
                Box::new(DeadWebsiteDetector),
                Box::new(AcquisitionDetector),
                Box::new(StalenessDetector::new(config)),
                Box::new(OperationalDetector::new(config)),
            ],
        }
    }

    /// Add a custom detector after the standard ones.
    pub fn with_detector(mut self, detector: impl Detector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    /// Run every applicable detector on one page.
    pub fn run(&self, page: &PageView<'_>) -> Vec<Signal> {
        let mut signals = self.empty.detect(page);

        let has_text = page.has_text();
        for detector in &self.detectors {
            if detector.requires_content() && !has_text {
                continue;
            }
            let found = detector.detect(page);
            if !found.is_empty() {
                tracing::debug!(
                    url = %page.url,
                    detector = detector.name(),
                    count = found.len(),
                    "Detector fired"
                );
            }
            signals.extend(found);
        }

        if page.content_source == ContentSource::Historical {
            signals = signals
                .into_iter()
                .map(|s| s.with_evidence("content_source", ContentSource::Historical.as_str()))
                .collect();
        }
        signals
    }
}

/// Lowercased text for phrase matching.
pub(crate) fn normalized(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
