//! Acquisition detector: M&A language and redirects to a parent domain.

use lazy_static::lazy_static;
use regex::Regex;

use super::{normalized, Detector, PageView};
use crate::types::signal::{Signal, SignalType};

lazy_static! {
    // (pattern, confidence); checked in order, first match wins
    static ref ACQUISITION_PATTERNS: Vec<(Regex, f32)> = vec![
        (Regex::new(r"(?i)\b(?:has been |was |were |we've been |we have been )?acquired by ([^.,;!\n]{2,60})").unwrap(), 0.85),
        (Regex::new(r"(?i)\bis now (?:a )?(?:wholly[- ]owned )?subsidiary of ([^.,;!\n]{2,60})").unwrap(), 0.85),
        (Regex::new(r"(?i)\b(?:is |are )?now (?:a )?part of ([^.,;!\n]{2,60})").unwrap(), 0.85),
        (Regex::new(r"(?i)\bhas been acquired\b").unwrap(), 0.85),
        (Regex::new(r"(?i)\bmerged with ([^.,;!\n]{2,60})").unwrap(), 0.7),
    ];
}

// Second-level labels under which registrations happen one level down
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "org", "net", "ac", "gov", "edu", "ltd"];

/// Best-effort registrable domain (`shop.acme.co.uk` -> `acme.co.uk`).
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }

    let n = labels.len();
    let keep = if labels[n - 1].len() == 2 && SECOND_LEVEL_SUFFIXES.contains(&labels[n - 2]) {
        3
    } else {
        2
    };
    labels[n - keep..].join(".")
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

/// Detects that a company has been bought or folded into another.
pub struct AcquisitionDetector;

impl AcquisitionDetector {
    fn phrase_signal(page: &PageView<'_>) -> Option<Signal> {
        let text = normalized(page.text);
        ACQUISITION_PATTERNS.iter().find_map(|(pattern, confidence)| {
            let caps = pattern.captures(&text)?;
            let phrase = caps.get(0)?.as_str().trim();
            let mut signal = page
                .signal(
                    SignalType::AcquisitionNotice,
                    *confidence,
                    format!("Acquisition language found: \"{}\"", phrase),
                )
                .with_evidence("phrase", phrase);
            if let Some(acquirer) = caps.get(1) {
                signal = signal.with_evidence("acquirer", acquirer.as_str().trim());
            }
            Some(signal)
        })
    }

    fn redirect_signal(page: &PageView<'_>) -> Option<Signal> {
        page.metadata.http_status?;
        let final_url = page.metadata.final_url.as_deref()?;

        let requested = registrable_domain(&host_of(page.url)?);
        let landed = registrable_domain(&host_of(final_url)?);
        if requested.is_empty() || landed.is_empty() || requested == landed {
            return None;
        }

        Some(
            page.signal(
                SignalType::RedirectToParent,
                0.75,
                format!("Redirects from {} to {}", requested, landed),
            )
            .with_evidence("from_domain", requested)
            .with_evidence("to_domain", landed)
            .with_evidence("final_url", final_url),
        )
    }
}

impl Detector for AcquisitionDetector {
    fn name(&self) -> &'static str {
        "acquisition"
    }

    // Redirects are visible without text
    fn requires_content(&self) -> bool {
        false
    }

    fn detect(&self, page: &PageView<'_>) -> Vec<Signal> {
        let mut signals = Vec::new();
        if page.has_text() {
            signals.extend(Self::phrase_signal(page));
        }
        signals.extend(Self::redirect_signal(page));
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::ContentSource;
    use crate::types::snapshot::PageMetadata;
    use crate::types::target::UrlRole;
    use chrono::Utc;

    fn view<'a>(text: &'a str, metadata: &'a PageMetadata) -> PageView<'a> {
        PageView {
            url: "https://www.acme.test/about",
            role: UrlRole::About,
            text,
            markup: None,
            metadata,
            succeeded: true,
            error: None,
            observed_at: Utc::now(),
            content_source: ContentSource::Fresh,
        }
    }

    fn ok() -> PageMetadata {
        PageMetadata {
            http_status: Some(200),
            ..Default::default()
        }
    }

    #[test]
    fn test_acquired_by() {
        let metadata = ok();
        let signals = AcquisitionDetector.detect(&view(
            "Big news: Acme has been acquired by Globex Corporation. Thanks for 10 great years.",
            &metadata,
        ));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, SignalType::AcquisitionNotice);
        assert_eq!(signals[0].confidence, 0.85);
        assert_eq!(signals[0].evidence["acquirer"], "globex corporation");
    }

    #[test]
    fn test_now_part_of_and_merger() {
        let metadata = ok();
        let part_of = AcquisitionDetector.detect(&view("Acme is now part of Initech", &metadata));
        assert_eq!(part_of[0].confidence, 0.85);

        let merged = AcquisitionDetector.detect(&view("In 2021 we merged with Hooli", &metadata));
        assert_eq!(merged[0].confidence, 0.7);
    }

    #[test]
    fn test_ordinary_text_is_quiet() {
        let metadata = ok();
        assert!(AcquisitionDetector
            .detect(&view("We build industrial robots for the automotive sector.", &metadata))
            .is_empty());
    }

    #[test]
    fn test_redirect_to_parent() {
        let metadata = PageMetadata {
            http_status: Some(200),
            final_url: Some("https://www.globex.com/brands/acme".into()),
            ..Default::default()
        };
        let signals = AcquisitionDetector.detect(&view("", &metadata));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, SignalType::RedirectToParent);
        assert_eq!(signals[0].confidence, 0.75);
        assert_eq!(signals[0].evidence["to_domain"], "globex.com");
    }

    #[test]
    fn test_same_site_redirect_is_quiet() {
        let metadata = PageMetadata {
            http_status: Some(200),
            final_url: Some("https://acme.test/about-us".into()),
            ..Default::default()
        };
        assert!(AcquisitionDetector.detect(&view("", &metadata)).is_empty());
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("www.acme.com"), "acme.com");
        assert_eq!(registrable_domain("shop.acme.co.uk"), "acme.co.uk");
        assert_eq!(registrable_domain("acme.io"), "acme.io");
        assert_eq!(registrable_domain("WWW.Acme.COM."), "acme.com");
    }
}
