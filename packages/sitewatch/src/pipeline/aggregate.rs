//! Signal aggregation: many signals in, one status and confidence out.
//!
//! Signals of each polarity are combined with a noisy-OR, so independent
//! pieces of evidence reinforce each other without ever exceeding 1.0:
//!
//! ```text
//! negative = 1 - Π(1 - w·c)   over negative signals (w = type weight)
//! positive = 1 - Π(1 - c)     over positive signals
//! operational_likelihood = positive · (1 - negative)
//! ```
//!
//! Adding a negative signal can only raise `negative`, so it never raises
//! the operational likelihood or moves the status toward `operational`.

use std::cmp::Ordering;

use crate::error::{PipelineError, Result};
use crate::types::{
    signal::{Polarity, Signal},
    status::{AggregatedResult, TargetStatus},
};

/// `likely_closed` needs at least this much negative evidence.
pub const CLOSED_THRESHOLD: f64 = 0.75;

/// `operational` needs at least this much positive evidence.
pub const OPERATIONAL_THRESHOLD: f64 = 0.5;

/// Negative evidence at or above this blocks `operational`.
pub const NEGATIVE_VETO: f64 = 0.5;

/// Canonical order, so the same signal set always serializes the same way.
fn canonical_order(a: &Signal, b: &Signal) -> Ordering {
    a.signal_type
        .cmp(&b.signal_type)
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.description.cmp(&b.description))
}

fn noisy_or<'a>(signals: impl Iterator<Item = &'a Signal>, weight: impl Fn(&Signal) -> f64) -> f64 {
    let miss: f64 = signals
        .map(|s| 1.0 - weight(s) * s.confidence as f64)
        .product();
    (1.0 - miss).clamp(0.0, 1.0)
}

/// Combine every signal found for one target.
///
/// Fails only on a malformed signal (confidence outside [0, 1] or NaN),
/// which is a bug in a detector rather than a data condition.
pub fn aggregate(mut signals: Vec<Signal>) -> Result<AggregatedResult> {
    if let Some(bad) = signals.iter().find(|s| !s.has_valid_confidence()) {
        return Err(PipelineError::InvariantViolation {
            reason: format!(
                "signal {} has confidence {} outside [0, 1]",
                bad.signal_type, bad.confidence
            ),
        });
    }

    if signals.is_empty() {
        return Ok(AggregatedResult::unresolved());
    }

    signals.sort_by(canonical_order);

    let negative = noisy_or(
        signals.iter().filter(|s| s.polarity() == Polarity::Negative),
        |s| s.signal_type.negative_weight(),
    );
    let positive = noisy_or(
        signals.iter().filter(|s| s.polarity() == Polarity::Positive),
        |_| 1.0,
    );
    let operational_likelihood = positive * (1.0 - negative);

    let (final_status, overall_confidence) =
        if negative >= CLOSED_THRESHOLD && positive < OPERATIONAL_THRESHOLD {
            (TargetStatus::LikelyClosed, negative * (1.0 - positive))
        } else if positive >= OPERATIONAL_THRESHOLD && negative < NEGATIVE_VETO {
            (TargetStatus::Operational, operational_likelihood)
        } else {
            (TargetStatus::RequiresReview, positive.max(negative))
        };

    Ok(AggregatedResult {
        all_signals: signals,
        overall_confidence: overall_confidence as f32,
        operational_likelihood: operational_likelihood as f32,
        positive_evidence: positive as f32,
        negative_evidence: negative as f32,
        final_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::signal::SignalType;
    use proptest::prelude::*;

    fn signal(signal_type: SignalType, confidence: f32) -> Signal {
        Signal::new(signal_type, confidence, signal_type.as_str())
    }

    #[test]
    fn test_no_signals_is_unknown() {
        let result = aggregate(Vec::new()).unwrap();
        assert_eq!(result.final_status, TargetStatus::Unknown);
        assert_eq!(result.overall_confidence, 0.0);
    }

    #[test]
    fn test_invalid_confidence_is_invariant_violation() {
        let err = aggregate(vec![signal(SignalType::HttpError, 1.2)]).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation { .. }));

        let err = aggregate(vec![signal(SignalType::HttpError, f32::NAN)]).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation { .. }));
    }

    #[test]
    fn test_lone_empty_content_needs_review() {
        let result = aggregate(vec![signal(SignalType::EmptyContent, 0.3)]).unwrap();
        assert_eq!(result.final_status, TargetStatus::RequiresReview);
        assert!((result.negative_evidence - 0.15).abs() < 1e-6);
        assert!((result.overall_confidence - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_hiring_is_operational() {
        let result = aggregate(vec![
            signal(SignalType::RecentJobPosting, 0.7),
            signal(SignalType::ActiveSocialMedia, 0.3),
        ])
        .unwrap();
        assert_eq!(result.final_status, TargetStatus::Operational);
        assert!((result.positive_evidence - 0.79).abs() < 1e-6);
    }

    #[test]
    fn test_all_dead_is_closed() {
        let result = aggregate(vec![
            signal(SignalType::PageNotFound, 0.8),
            signal(SignalType::PageNotFound, 0.8),
            signal(SignalType::PageNotFound, 0.8),
            signal(SignalType::AllUrlsDead, 0.9),
        ])
        .unwrap();
        assert_eq!(result.final_status, TargetStatus::LikelyClosed);
        assert!(result.overall_confidence > 0.99);
    }

    #[test]
    fn test_conflicting_evidence_needs_review() {
        let result = aggregate(vec![
            signal(SignalType::RecentJobPosting, 0.8),
            signal(SignalType::AcquisitionNotice, 0.85),
        ])
        .unwrap();
        assert_eq!(result.final_status, TargetStatus::RequiresReview);
        assert!((result.overall_confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = vec![
            signal(SignalType::RecentNews, 0.6),
            signal(SignalType::HttpError, 0.4),
            signal(SignalType::StaleContent, 0.5),
        ];
        let mut b = a.clone();
        b.reverse();

        let ra = aggregate(a).unwrap();
        let rb = aggregate(b).unwrap();
        assert_eq!(ra.overall_confidence, rb.overall_confidence);
        assert_eq!(ra.final_status, rb.final_status);
        assert_eq!(ra.all_signals, rb.all_signals);
    }

    fn arb_signal() -> impl Strategy<Value = Signal> {
        (0..SignalType::ALL.len(), 0.0f32..=1.0f32)
            .prop_map(|(i, c)| signal(SignalType::ALL[i], c))
    }

    fn arb_negative() -> impl Strategy<Value = Signal> {
        let negatives: Vec<SignalType> = SignalType::ALL
            .into_iter()
            .filter(|t| t.polarity() == Polarity::Negative)
            .collect();
        (0..negatives.len(), 0.0f32..=1.0f32)
            .prop_map(move |(i, c)| signal(negatives[i], c))
    }

    fn rank_toward_operational(status: TargetStatus) -> u8 {
        match status {
            TargetStatus::Operational => 2,
            TargetStatus::RequiresReview | TargetStatus::Unknown => 1,
            TargetStatus::LikelyClosed => 0,
        }
    }

    proptest! {
        #[test]
        fn prop_deterministic(signals in prop::collection::vec(arb_signal(), 0..12)) {
            let first = aggregate(signals.clone()).unwrap();
            let second = aggregate(signals).unwrap();
            prop_assert_eq!(first.overall_confidence, second.overall_confidence);
            prop_assert_eq!(first.final_status, second.final_status);
        }

        #[test]
        fn prop_negative_never_helps(
            signals in prop::collection::vec(arb_signal(), 1..10),
            extra in arb_negative(),
        ) {
            let before = aggregate(signals.clone()).unwrap();
            let mut more = signals;
            more.push(extra);
            let after = aggregate(more).unwrap();

            prop_assert!(after.operational_likelihood <= before.operational_likelihood + 1e-6);
            prop_assert!(
                rank_toward_operational(after.final_status)
                    <= rank_toward_operational(before.final_status)
            );
        }

        #[test]
        fn prop_outputs_in_unit_range(signals in prop::collection::vec(arb_signal(), 0..12)) {
            let result = aggregate(signals).unwrap();
            prop_assert!((0.0..=1.0).contains(&result.overall_confidence));
            prop_assert!((0.0..=1.0).contains(&result.operational_likelihood));
        }
    }
}
