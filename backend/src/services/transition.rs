//! Classification of block visit status changes.
//!
//! Only two kinds of change move time or counters: flipping between Accepted
//! and Rejected, and moving a rejection between the weather and technical
//! buckets. Everything else is a no-op for accounting purposes.

use serde::{Deserialize, Serialize};

use crate::models::{BlockVisitStatus, LostTimeBucket, RejectionReason, VisitState};

/// Accounting category of a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionCategory {
    NoOp,
    ReasonChangeWeatherToTechnical,
    ReasonChangeTechnicalToWeather,
    AcceptToReject,
    RejectToAccept,
}

impl TransitionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionCategory::NoOp => "NO_OP",
            TransitionCategory::ReasonChangeWeatherToTechnical => {
                "REASON_CHANGE_WEATHER_TO_TECHNICAL"
            }
            TransitionCategory::ReasonChangeTechnicalToWeather => {
                "REASON_CHANGE_TECHNICAL_TO_WEATHER"
            }
            TransitionCategory::AcceptToReject => "ACCEPT_TO_REJECT",
            TransitionCategory::RejectToAccept => "REJECT_TO_ACCEPT",
        }
    }
}

impl std::fmt::Display for TransitionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified change from one visit state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: VisitState,
    pub to: VisitState,
    pub category: TransitionCategory,
}

impl StatusTransition {
    pub fn classify(from: VisitState, to: VisitState) -> Self {
        Self {
            from,
            to,
            category: classify_transition(&from, &to),
        }
    }

    /// Reason the visit was rejected with before the change, if any.
    pub fn previous_reason(&self) -> Option<RejectionReason> {
        self.from.rejection_reason
    }

    /// Reason the visit is rejected with after the change, if any.
    pub fn new_reason(&self) -> Option<RejectionReason> {
        self.to.rejection_reason
    }
}

/// Classify a change of `(status, reason)`.
///
/// Rejected→Rejected is a reason change only when it crosses the weather and
/// technical buckets; staying within a bucket, or involving a reason outside
/// both, is a no-op. Visits that were neither accepted nor rejected (queued)
/// have nothing booked yet, so any change from them is a no-op as well.
pub fn classify_transition(current: &VisitState, requested: &VisitState) -> TransitionCategory {
    use BlockVisitStatus::{Accepted, Rejected};

    match (current.status, requested.status) {
        (Accepted, Rejected) => TransitionCategory::AcceptToReject,
        (Rejected, Accepted) => TransitionCategory::RejectToAccept,
        (Rejected, Rejected) => {
            let before = current.rejection_reason.and_then(|r| r.lost_time_bucket());
            let after = requested.rejection_reason.and_then(|r| r.lost_time_bucket());
            match (before, after) {
                (Some(LostTimeBucket::Weather), Some(LostTimeBucket::Technical)) => {
                    TransitionCategory::ReasonChangeWeatherToTechnical
                }
                (Some(LostTimeBucket::Technical), Some(LostTimeBucket::Weather)) => {
                    TransitionCategory::ReasonChangeTechnicalToWeather
                }
                _ => TransitionCategory::NoOp,
            }
        }
        _ => TransitionCategory::NoOp,
    }
}
