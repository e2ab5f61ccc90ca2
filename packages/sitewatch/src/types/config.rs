//! Configuration types for the scraping and status pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub detectors: DetectorConfig,

    #[serde(default)]
    pub fallback: FallbackPolicy,

    #[serde(default)]
    pub status_policy: StatusPolicy,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detectors(mut self, detectors: DetectorConfig) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Tunables for the detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Confidence of `empty_content` when both text and markup are blank.
    ///
    /// Default: 0.3.
    pub empty_content_confidence: f32,

    /// Confidence of `empty_content` when markup came back but no text
    /// could be extracted from it.
    ///
    /// Default: 0.2.
    pub extraction_failure_confidence: f32,

    /// Copyright years this far behind the observation year count as stale.
    ///
    /// Default: 2.
    pub stale_after_years: i32,

    /// Dated mentions within this many days count as recent news.
    ///
    /// Default: 180.
    pub recent_days: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            empty_content_confidence: 0.3,
            extraction_failure_confidence: 0.2,
            stale_after_years: 2,
            recent_days: 180,
        }
    }
}

impl DetectorConfig {
    pub fn with_empty_content_confidence(mut self, confidence: f32) -> Self {
        self.empty_content_confidence = confidence;
        self
    }

    pub fn with_extraction_failure_confidence(mut self, confidence: f32) -> Self {
        self.extraction_failure_confidence = confidence;
        self
    }

    pub fn with_stale_after_years(mut self, years: i32) -> Self {
        self.stale_after_years = years;
        self
    }

    pub fn with_recent_days(mut self, days: i64) -> Self {
        self.recent_days = days;
        self
    }
}

/// Which stored snapshots may stand in for a blank fresh scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    /// Only consider snapshots recorded as nominal successes.
    pub successful_only: bool,

    /// Ignore snapshots older than this. `None` means no age limit.
    pub max_age_days: Option<i64>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            successful_only: true,
            max_age_days: Some(90),
        }
    }
}

impl FallbackPolicy {
    /// Any non-blank snapshot, however old.
    pub fn unbounded() -> Self {
        Self {
            successful_only: false,
            max_age_days: None,
        }
    }

    pub fn with_max_age_days(mut self, days: Option<i64>) -> Self {
        self.max_age_days = days;
        self
    }

    pub fn with_successful_only(mut self, successful_only: bool) -> Self {
        self.successful_only = successful_only;
        self
    }
}

/// What to do when a pass yields no evidence at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Record `unknown`, even if the target previously had a status.
    #[default]
    AllowRegression,
    /// Keep the previous non-unknown status.
    StickyLastKnown,
}

/// Bounded retry for store commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Default: 3.
    pub max_attempts: u32,

    /// Delay before the second attempt. Default: 100ms.
    pub initial_backoff_ms: u64,

    /// Default: 2.
    pub multiplier: u32,

    /// Default: 2000ms.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            multiplier: 2,
            max_backoff_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits between attempts (tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            multiplier: 1,
            max_backoff_ms: 0,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = (self.multiplier.max(1) as u64).saturating_pow(exponent);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}
