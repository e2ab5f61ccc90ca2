//! Status determination: turn an aggregated result into an audit record.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{
    config::StatusPolicy,
    ids::DeterminationId,
    signal::{Polarity, Signal},
    status::{AggregatedResult, StatusDetermination, TargetStatus},
    target::Target,
};

/// How many signals the explanation names.
const STRONGEST_LISTED: usize = 3;

/// Builds `StatusDetermination` rows under a `StatusPolicy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusDeterminer {
    policy: StatusPolicy,
}

impl StatusDeterminer {
    pub fn new(policy: StatusPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Determine the target's status for this pass.
    ///
    /// Under `StickyLastKnown`, a pass that lands on `unknown` keeps the
    /// target's previous known status and confidence.
    pub fn determine(
        &self,
        target: &Target,
        result: &AggregatedResult,
        determined_at: DateTime<Utc>,
    ) -> StatusDetermination {
        let keep_previous = self.policy == StatusPolicy::StickyLastKnown
            && result.final_status == TargetStatus::Unknown
            && target.status != TargetStatus::Unknown;

        let (status, confidence, explanation) = if keep_previous {
            debug!(
                target_id = %target.id,
                status = %target.status,
                "No evidence this pass, keeping last known status"
            );
            (
                target.status,
                target.confidence,
                format!(
                    "{} kept from previous determination (confidence {:.2}): this pass produced no signals",
                    target.status, target.confidence
                ),
            )
        } else {
            (
                result.final_status,
                result.overall_confidence,
                explain(result),
            )
        };

        StatusDetermination {
            id: DeterminationId::new(),
            target_id: target.id,
            status,
            confidence,
            explanation,
            signals: result.all_signals.clone(),
            determined_at,
        }
    }
}

/// Deterministic human-readable summary of an aggregated result.
pub fn explain(result: &AggregatedResult) -> String {
    if result.all_signals.is_empty() {
        return format!("{}: no signals detected", result.final_status);
    }

    let positive = result
        .all_signals
        .iter()
        .filter(|s| s.polarity() == Polarity::Positive)
        .count();
    let negative = result.all_signals.len() - positive;

    // Signals arrive in canonical order; a stable sort keeps ties that way
    let mut strongest: Vec<&Signal> = result.all_signals.iter().collect();
    strongest.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let listed: Vec<String> = strongest
        .into_iter()
        .take(STRONGEST_LISTED)
        .map(|s| match &s.url {
            Some(url) => format!("{} {:.2} ({})", s.signal_type, s.confidence, url),
            None => format!("{} {:.2}", s.signal_type, s.confidence),
        })
        .collect();

    format!(
        "{} (confidence {:.2}): {} positive, {} negative signals; strongest: {}",
        result.final_status,
        result.overall_confidence,
        positive,
        negative,
        listed.join("; ")
    )
}
