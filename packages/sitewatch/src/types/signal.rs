//! Signals: one detected, typed, confidence-scored fact about a target.
//!
//! The taxonomy is closed. Detectors produce signals, the aggregator
//! consumes them, and status determinations persist a serialized copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of signal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    HttpError,
    DomainExpired,
    PageNotFound,
    AcquisitionNotice,
    RedirectToParent,
    RecentJobPosting,
    RecentNews,
    ActiveSocialMedia,
    EmptyContent,
    StaleContent,
    AllUrlsDead,
}

/// Which way a signal pushes the operational verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Evidence the business is running
    Positive,
    /// Evidence the site or business is gone
    Negative,
}

impl SignalType {
    /// Every signal type, in taxonomy order.
    pub const ALL: [SignalType; 11] = [
        SignalType::HttpError,
        SignalType::DomainExpired,
        SignalType::PageNotFound,
        SignalType::AcquisitionNotice,
        SignalType::RedirectToParent,
        SignalType::RecentJobPosting,
        SignalType::RecentNews,
        SignalType::ActiveSocialMedia,
        SignalType::EmptyContent,
        SignalType::StaleContent,
        SignalType::AllUrlsDead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::HttpError => "http_error",
            SignalType::DomainExpired => "domain_expired",
            SignalType::PageNotFound => "page_not_found",
            SignalType::AcquisitionNotice => "acquisition_notice",
            SignalType::RedirectToParent => "redirect_to_parent",
            SignalType::RecentJobPosting => "recent_job_posting",
            SignalType::RecentNews => "recent_news",
            SignalType::ActiveSocialMedia => "active_social_media",
            SignalType::EmptyContent => "empty_content",
            SignalType::StaleContent => "stale_content",
            SignalType::AllUrlsDead => "all_urls_dead",
        }
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            SignalType::RecentJobPosting | SignalType::RecentNews | SignalType::ActiveSocialMedia => {
                Polarity::Positive
            }
            _ => Polarity::Negative,
        }
    }

    /// Weight applied to the confidence of a negative signal.
    ///
    /// Empty content and stale content are ambiguous: a blank page may be a
    /// scraper block, and an old copyright line is common on live sites.
    pub fn negative_weight(&self) -> f64 {
        match self {
            SignalType::EmptyContent => 0.5,
            SignalType::StaleContent => 0.6,
            _ => 1.0,
        }
    }

    /// Signal types that mean "this URL is dead".
    pub fn is_dead_class(&self) -> bool {
        matches!(
            self,
            SignalType::HttpError | SignalType::PageNotFound | SignalType::DomainExpired
        )
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown signal type: {}", s))
    }
}

/// A single detected fact about a target website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,

    /// Detector confidence (0.0-1.0).
    pub confidence: f32,

    /// Human-readable description of what was found.
    pub description: String,

    /// Supporting evidence (matched phrases, status codes, hosts...).
    ///
    /// A `BTreeMap` so serialized signal lists are byte-stable.
    #[serde(default)]
    pub evidence: BTreeMap<String, serde_json::Value>,

    pub detected_at: DateTime<Utc>,

    /// URL the signal was detected on; `None` for cross-URL signals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Signal {
    /// Create a new signal detected now.
    pub fn new(signal_type: SignalType, confidence: f32, description: impl Into<String>) -> Self {
        Self {
            signal_type,
            confidence,
            description: description.into(),
            evidence: BTreeMap::new(),
            detected_at: Utc::now(),
            url: None,
        }
    }

    /// Add an evidence entry.
    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }

    /// Attach the URL the signal was found on.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the detection timestamp.
    pub fn with_detected_at(mut self, detected_at: DateTime<Utc>) -> Self {
        self.detected_at = detected_at;
        self
    }

    pub fn polarity(&self) -> Polarity {
        self.signal_type.polarity()
    }

    /// Whether the confidence is a finite value in [0, 1].
    pub fn has_valid_confidence(&self) -> bool {
        self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_type_string_roundtrip() {
        for t in SignalType::ALL {
            assert_eq!(t.as_str().parse::<SignalType>().unwrap(), t);
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
        assert!("bogus".parse::<SignalType>().is_err());
    }

    #[test]
    fn test_polarity() {
        assert_eq!(SignalType::RecentJobPosting.polarity(), Polarity::Positive);
        assert_eq!(SignalType::EmptyContent.polarity(), Polarity::Negative);
        assert_eq!(SignalType::AcquisitionNotice.polarity(), Polarity::Negative);
    }

    #[test]
    fn test_signal_builder() {
        let signal = Signal::new(SignalType::PageNotFound, 0.8, "HTTP 404")
            .with_evidence("http_status", 404)
            .with_url("https://example.com/careers");

        assert_eq!(signal.evidence.get("http_status"), Some(&serde_json::json!(404)));
        assert_eq!(signal.url.as_deref(), Some("https://example.com/careers"));
        assert!(signal.has_valid_confidence());
    }

    #[test]
    fn test_invalid_confidence() {
        assert!(!Signal::new(SignalType::HttpError, 1.5, "x").has_valid_confidence());
        assert!(!Signal::new(SignalType::HttpError, f32::NAN, "x").has_valid_confidence());
        assert!(!Signal::new(SignalType::HttpError, -0.1, "x").has_valid_confidence());
    }
}
