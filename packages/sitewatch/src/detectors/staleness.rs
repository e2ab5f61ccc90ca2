//! Staleness detector: old copyright lines and old `Last-Modified` headers.

use chrono::Datelike;
use lazy_static::lazy_static;
use regex::Regex;

use super::{Detector, PageView};
use crate::types::{
    config::DetectorConfig,
    signal::{Signal, SignalType},
};

lazy_static! {
    // "© 2019", "Copyright (c) 2015-2019", "&copy; 2020 Acme"
    static ref COPYRIGHT_RE: Regex = Regex::new(
        r"(?i)(?:copyright|©|&copy;|\(c\))(?:\s|©|&copy;|\(c\))*((?:19|20)\d{2})(?:\s*[-–]\s*((?:19|20)\d{2}))?"
    ).unwrap();
}

const EARLIEST_PLAUSIBLE_YEAR: i32 = 1990;

/// Flags sites that have not been touched in years.
pub struct StalenessDetector {
    stale_after_years: i32,
}

impl StalenessDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            stale_after_years: config.stale_after_years.max(1),
        }
    }

    /// Latest plausible copyright year in the text (or markup footer).
    fn latest_copyright_year(page: &PageView<'_>, current_year: i32) -> Option<i32> {
        let mut sources = vec![page.text];
        if let Some(markup) = page.markup {
            sources.push(markup);
        }

        sources
            .into_iter()
            .flat_map(|source| COPYRIGHT_RE.captures_iter(source))
            .flat_map(|caps| {
                [caps.get(1), caps.get(2)]
                    .into_iter()
                    .flatten()
                    .filter_map(|m| m.as_str().parse::<i32>().ok())
                    .collect::<Vec<_>>()
            })
            .filter(|year| (EARLIEST_PLAUSIBLE_YEAR..=current_year + 1).contains(year))
            .max()
    }

    fn copyright_signal(&self, page: &PageView<'_>) -> Option<Signal> {
        let current_year = page.observed_at.year();
        let latest = Self::latest_copyright_year(page, current_year)?;
        let lag = current_year - latest;
        if lag < self.stale_after_years {
            return None;
        }

        let extra_years = (lag - self.stale_after_years) as f32;
        let confidence = (0.5 + 0.1 * extra_years).min(0.8);
        Some(
            page.signal(
                SignalType::StaleContent,
                confidence,
                format!("Latest copyright year is {} ({} years old)", latest, lag),
            )
            .with_evidence("copyright_year", latest)
            .with_evidence("years_behind", lag),
        )
    }

    fn last_modified_signal(&self, page: &PageView<'_>) -> Option<Signal> {
        let last_modified = page.metadata.last_modified?;
        let age = page.observed_at - last_modified;
        if age < chrono::Duration::days(365 * self.stale_after_years as i64) {
            return None;
        }
        Some(
            page.signal(
                SignalType::StaleContent,
                0.5,
                format!("Last modified {} days ago", age.num_days()),
            )
            .with_evidence("last_modified", last_modified.to_rfc3339()),
        )
    }
}

impl Default for StalenessDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

impl Detector for StalenessDetector {
    fn name(&self) -> &'static str {
        "staleness"
    }

    /// Emits at most one signal: the stronger of the two checks.
    fn detect(&self, page: &PageView<'_>) -> Vec<Signal> {
        let copyright = self.copyright_signal(page);
        let modified = self.last_modified_signal(page);

        let strongest = match (copyright, modified) {
            (Some(c), Some(m)) => {
                let last_modified = m.evidence.get("last_modified").cloned();
                let mut best = if m.confidence > c.confidence { m } else { c };
                if let Some(value) = last_modified {
                    best.evidence.insert("last_modified".into(), value);
                }
                Some(best)
            }
            (c, m) => c.or(m),
        };
        strongest.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::ContentSource;
    use crate::types::snapshot::PageMetadata;
    use crate::types::target::UrlRole;
    use chrono::{DateTime, TimeZone, Utc};

    fn observed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn view<'a>(text: &'a str, metadata: &'a PageMetadata) -> PageView<'a> {
        PageView {
            url: "https://acme.test/",
            role: UrlRole::Homepage,
            text,
            markup: None,
            metadata,
            succeeded: true,
            error: None,
            observed_at: observed(),
            content_source: ContentSource::Fresh,
        }
    }

    #[test]
    fn test_recent_copyright_is_quiet() {
        let metadata = PageMetadata::default();
        let detector = StalenessDetector::default();
        assert!(detector.detect(&view("© 2025 Acme Inc.", &metadata)).is_empty());
        assert!(detector.detect(&view("Copyright 2024 Acme", &metadata)).is_empty());
    }

    #[test]
    fn test_old_copyright_scales_and_caps() {
        let metadata = PageMetadata::default();
        let detector = StalenessDetector::default();

        let two_years = detector.detect(&view("© 2023 Acme", &metadata));
        assert_eq!(two_years.len(), 1);
        assert!((two_years[0].confidence - 0.5).abs() < 1e-6);

        let four_years = detector.detect(&view("Copyright (c) 2015-2021 Acme", &metadata));
        assert!((four_years[0].confidence - 0.7).abs() < 1e-6);
        assert_eq!(four_years[0].evidence["copyright_year"], 2021);

        let ancient = detector.detect(&view("© 2001 Acme", &metadata));
        assert!((ancient[0].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_latest_year_wins() {
        let metadata = PageMetadata::default();
        let signals = StalenessDetector::default().detect(&view(
            "Founded 1998. Copyright 2010. Site © 2025 Acme",
            &metadata,
        ));
        assert!(signals.is_empty());
    }

    #[test]
    fn test_old_last_modified() {
        let metadata = PageMetadata {
            http_status: Some(200),
            last_modified: Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let signals = StalenessDetector::default().detect(&view("Welcome to Acme", &metadata));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].confidence, 0.5);
        assert!(signals[0].evidence.contains_key("last_modified"));
    }

    #[test]
    fn test_nonsense_years_ignored() {
        let metadata = PageMetadata::default();
        assert!(StalenessDetector::default()
            .detect(&view("Copyright 2099 Acme", &metadata))
            .is_empty());
    }
}
