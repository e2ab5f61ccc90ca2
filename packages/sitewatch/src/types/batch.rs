//! Per-target dispositions and batch summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TargetId;
use super::status::TargetStatus;

/// Why a target failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetErrorKind {
    /// No backend got an HTTP response for any of the target's URLs
    AllUrlsFailed,
    /// The target's registry lookup or commit failed
    Storage,
}

/// Structured error attached to a failed target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetError {
    pub kind: TargetErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl TargetError {
    pub fn new(kind: TargetErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// What happened to one target in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    Completed {
        status: TargetStatus,
        confidence: f32,
        signal_count: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: TargetError,
    },
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Completed { .. } => "completed",
            Disposition::Skipped { .. } => "skipped",
            Disposition::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Disposition::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub target_id: TargetId,
    pub target_name: String,
    #[serde(flatten)]
    pub disposition: Disposition,
}

/// Aggregate counts for a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Targets never reached because the batch was cancelled
    pub not_processed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Completed { .. } => self.completed += 1,
            Disposition::Skipped { .. } => self.skipped += 1,
            Disposition::Failed { .. } => self.failed += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

/// Result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<TargetOutcome>,
    pub summary: BatchSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
}

impl BatchReport {
    /// Outcome for a target, if it was processed.
    pub fn outcome(&self, target_id: TargetId) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.target_id == target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = BatchSummary::default();
        summary.record(&Disposition::Skipped {
            reason: "no active URLs".into(),
        });
        summary.record(&Disposition::Failed {
            error: TargetError::new(TargetErrorKind::AllUrlsFailed, "boom"),
        });
        summary.record(&Disposition::Completed {
            status: TargetStatus::Operational,
            confidence: 0.7,
            signal_count: 2,
        });
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed(), 3);
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = TargetOutcome {
            target_id: TargetId::new(),
            target_name: "Acme".into(),
            disposition: Disposition::Skipped {
                reason: "no active URLs".into(),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["disposition"], "skipped");
        assert_eq!(json["reason"], "no active URLs");
    }
}
