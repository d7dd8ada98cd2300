//! Block completion counters and lifecycle status.

use super::transition::{StatusTransition, TransitionCategory};
use crate::models::{BlockCounters, BlockStatus};

/// Compute the counters of the authoritative block after `transition`.
///
/// Only accept/reject flips move the counters. A completed block whose visit
/// was just rejected becomes active again; a block whose visit was just
/// accepted completes once the accepted count reaches the requested count.
/// Only the Active/Completed pair is ever rewritten; an on-hold, expired or
/// superseded block keeps its status while its counters move.
pub fn reconcile_block_counters(
    counters: BlockCounters,
    transition: &StatusTransition,
) -> BlockCounters {
    let mut next = counters;

    match transition.category {
        TransitionCategory::AcceptToReject => {
            next.accepted_observations -= 1;
            next.rejected_observations += 1;
            if next.status == BlockStatus::Completed {
                next.status = BlockStatus::Active;
            }
        }
        TransitionCategory::RejectToAccept => {
            next.accepted_observations += 1;
            next.rejected_observations -= 1;
            if next.status == BlockStatus::Active
                && next.accepted_observations == next.requested_observations
            {
                next.status = BlockStatus::Completed;
            }
        }
        TransitionCategory::ReasonChangeWeatherToTechnical
        | TransitionCategory::ReasonChangeTechnicalToWeather
        | TransitionCategory::NoOp => {}
    }

    next
}
