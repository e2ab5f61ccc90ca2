//! Status taxonomy, aggregated results and persisted determinations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{DeterminationId, TargetId};
use super::signal::Signal;
use super::snapshot::ContentSnapshot;

/// Classification of a target.
///
/// `Unknown` is both the initial state and a valid outcome when a pass
/// produced no usable evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Unknown,
    Operational,
    RequiresReview,
    LikelyClosed,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Unknown => "unknown",
            TargetStatus::Operational => "operational",
            TargetStatus::RequiresReview => "requires_review",
            TargetStatus::LikelyClosed => "likely_closed",
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(TargetStatus::Unknown),
            "operational" => Ok(TargetStatus::Operational),
            "requires_review" => Ok(TargetStatus::RequiresReview),
            "likely_closed" => Ok(TargetStatus::LikelyClosed),
            other => Err(format!("unknown target status: {}", other)),
        }
    }
}

/// Combined view of every signal produced for one target in one pass.
///
/// Not persisted directly; feeds the status determination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub all_signals: Vec<Signal>,

    /// Confidence in `final_status` (0.0-1.0)
    pub overall_confidence: f32,

    /// Likelihood the business is operational (0.0-1.0)
    pub operational_likelihood: f32,

    /// Combined positive evidence (noisy-OR of positive signals)
    pub positive_evidence: f32,

    /// Combined negative evidence (weighted noisy-OR of negative signals)
    pub negative_evidence: f32,

    pub final_status: TargetStatus,
}

impl AggregatedResult {
    /// The result for a pass that produced no signals.
    pub fn unresolved() -> Self {
        Self {
            all_signals: Vec::new(),
            overall_confidence: 0.0,
            operational_likelihood: 0.0,
            positive_evidence: 0.0,
            negative_evidence: 0.0,
            final_status: TargetStatus::Unknown,
        }
    }
}

/// Persisted, append-only audit record of one classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDetermination {
    pub id: DeterminationId,
    pub target_id: TargetId,
    pub status: TargetStatus,
    pub confidence: f32,
    pub explanation: String,
    pub signals: Vec<Signal>,
    pub determined_at: DateTime<Utc>,
}

/// Everything one target's processing pass writes.
///
/// Committed in a single transaction so an interrupted batch never
/// leaves a target half-written.
#[derive(Debug, Clone, Default)]
pub struct TargetPass {
    pub snapshots: Vec<ContentSnapshot>,

    /// `None` when the pass failed and no classification was made
    pub determination: Option<StatusDetermination>,
}

impl TargetPass {
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.determination.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TargetStatus::Unknown,
            TargetStatus::Operational,
            TargetStatus::RequiresReview,
            TargetStatus::LikelyClosed,
        ] {
            assert_eq!(status.as_str().parse::<TargetStatus>().unwrap(), status);
        }
        assert!("closed".parse::<TargetStatus>().is_err());
    }

    #[test]
    fn test_unresolved_is_unknown() {
        let result = AggregatedResult::unresolved();
        assert_eq!(result.final_status, TargetStatus::Unknown);
        assert!(result.all_signals.is_empty());
    }
}
