//! Dead-website detector: error statuses, unreachable hosts, parked
//! domains and soft 404s.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use super::{normalized, Detector, PageView};
use crate::types::signal::{Signal, SignalType};

lazy_static! {
    // Registrar and parking-page boilerplate
    static ref PARKED_RE: Regex = Regex::new(
        r"(?i)\b(this domain (?:name )?(?:is|may be) for sale|buy this domain|domain (?:has )?expired|this domain has been registered|parked (?:free|domain)|domain parking|renew (?:this|your) domain|this site can(?:'|no)t be reached)\b"
    ).unwrap();

    static ref SOFT_404_RE: Regex = Regex::new(
        r"(?i)\b(page not found|404 not found|error 404|this page (?:does not|doesn't) exist|the page you (?:are|were|'re) looking for (?:could not|can't|cannot) be found)\b"
    ).unwrap();
}

// Substrings that identify a name-resolution failure in a transport error
const DNS_FAILURE_MARKERS: &[&str] = &[
    "dns error",
    "dns resolution failed",
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "no such host",
    "enotfound",
    "nxdomain",
];

/// Detects dead or dying sites.
///
/// Status-driven checks run on every page, including ones without text;
/// phrase checks need text.
pub struct DeadWebsiteDetector;

impl DeadWebsiteDetector {
    fn status_signal(page: &PageView<'_>, status: u16) -> Option<Signal> {
        let (signal_type, confidence, description) = match status {
            404 => (SignalType::PageNotFound, 0.8, "Page returned 404 Not Found"),
            410 => (SignalType::PageNotFound, 0.9, "Page returned 410 Gone"),
            status if REFUSAL_STATUSES.contains(&status) => (
                SignalType::HttpError,
                0.4,
                "Request was refused (possibly bot protection)",
            ),
            400..=499 => (SignalType::HttpError, 0.5, "Page returned a client error"),
            500..=599 => (SignalType::HttpError, 0.6, "Page returned a server error"),
            _ => return None,
        };
        Some(
            page.signal(signal_type, confidence, description)
                .with_evidence("http_status", status),
        )
    }

    fn transport_signal(page: &PageView<'_>, error: &str) -> Signal {
        let lowered = error.to_lowercase();
        if DNS_FAILURE_MARKERS.iter().any(|m| lowered.contains(m)) {
            page.signal(
                SignalType::DomainExpired,
                0.7,
                "Domain does not resolve",
            )
            .with_evidence("error", error)
        } else {
            page.signal(SignalType::HttpError, 0.5, "Site could not be reached")
                .with_evidence("error", error)
        }
    }

    fn content_signals(page: &PageView<'_>) -> Vec<Signal> {
        let text = normalized(page.text);
        let mut signals = Vec::new();

        if let Some(m) = PARKED_RE.find(&text) {
            signals.push(
                page.signal(
                    SignalType::DomainExpired,
                    0.85,
                    "Page looks like a parked or expired domain",
                )
                .with_evidence("phrase", m.as_str()),
            );
        }

        // A 404 status already produced a signal; only flag 2xx pages
        if page.succeeded {
            if let Some(m) = SOFT_404_RE.find(&text) {
                signals.push(
                    page.signal(
                        SignalType::PageNotFound,
                        0.6,
                        "Page content says it was not found",
                    )
                    .with_evidence("phrase", m.as_str()),
                );
            }
        }
        signals
    }
}

impl Detector for DeadWebsiteDetector {
    fn name(&self) -> &'static str {
        "dead_website"
    }

    fn requires_content(&self) -> bool {
        false
    }

    fn detect(&self, page: &PageView<'_>) -> Vec<Signal> {
        let mut signals = Vec::new();

        match (page.metadata.http_status, page.error) {
            (Some(status), _) => signals.extend(Self::status_signal(page, status)),
            (None, Some(error)) => signals.push(Self::transport_signal(page, error)),
            (None, None) => {}
        }

        if page.has_text() {
            signals.extend(Self::content_signals(page));
        }
        signals
    }
}

/// Statuses a live site uses to turn scrapers away.
const REFUSAL_STATUSES: [u16; 2] = [403, 429];

/// Whether a signal says its URL is gone. A refused request is not.
fn marks_url_dead(signal: &Signal) -> bool {
    if !signal.signal_type.is_dead_class() {
        return false;
    }
    let refused = signal
        .evidence
        .get("http_status")
        .and_then(|v| v.as_u64())
        .map(|status| REFUSAL_STATUSES.iter().any(|r| u64::from(*r) == status))
        .unwrap_or(false);
    !refused
}

/// Cross-URL check: every URL of the target is dead.
///
/// `per_url` holds the signals found on each URL. Needs at least two URLs
/// so a single broken link is not read as a dead company. Refused requests
/// (403, 429) don't count as dead.
pub fn detect_all_dead(per_url: &[Vec<Signal>], observed_at: DateTime<Utc>) -> Option<Signal> {
    if per_url.len() < 2 {
        return None;
    }
    let all_dead = per_url
        .iter()
        .all(|signals| signals.iter().any(marks_url_dead));
    if !all_dead {
        return None;
    }

    Some(
        Signal::new(
            SignalType::AllUrlsDead,
            0.9,
            format!("All {} URLs for this target are dead", per_url.len()),
        )
        .with_evidence("url_count", per_url.len())
        .with_detected_at(observed_at),
    )
}
