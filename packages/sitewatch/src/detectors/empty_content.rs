//! Empty-content detector.

use super::{Detector, PageView};
use crate::types::{config::DetectorConfig, signal::Signal, signal::SignalType};

/// Fires when a nominally successful fetch produced no text.
///
/// Blank pages are ambiguous (scraper blocked, client-side rendering,
/// genuinely empty site), so confidence stays low. Markup without text is
/// the weaker of the two cases: it usually means extraction failed.
pub struct EmptyContentDetector {
    blank_confidence: f32,
    extraction_failure_confidence: f32,
}

impl EmptyContentDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            blank_confidence: config.empty_content_confidence,
            extraction_failure_confidence: config.extraction_failure_confidence,
        }
    }
}

impl Default for EmptyContentDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

impl Detector for EmptyContentDetector {
    fn name(&self) -> &'static str {
        "empty_content"
    }

    fn requires_content(&self) -> bool {
        false
    }

    fn detect(&self, page: &PageView<'_>) -> Vec<Signal> {
        if !page.succeeded || page.has_text() {
            return Vec::new();
        }

        let signal = if page.has_markup() {
            page.signal(
                SignalType::EmptyContent,
                self.extraction_failure_confidence,
                "Page returned markup but no extractable text",
            )
            .with_evidence("case", "markup_without_text")
        } else {
            page.signal(
                SignalType::EmptyContent,
                self.blank_confidence,
                "Page returned an empty response",
            )
            .with_evidence("case", "blank_response")
        };

        let signal = match page.metadata.http_status {
            Some(status) => signal.with_evidence("http_status", status),
            None => signal,
        };
        vec![signal]
    }
}
