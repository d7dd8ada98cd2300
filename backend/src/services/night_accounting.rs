//! Per-night time accounting.

use super::transition::{StatusTransition, TransitionCategory};
use crate::models::{LostTimeBucket, NightTimeTotals, RejectionReason};

/// Compute the night totals after `transition`, for a visit observed for
/// `observation_time` seconds.
///
/// Rejecting an accepted visit moves its time out of science time and into the
/// lost-time bucket of the new reason; accepting a rejected one moves it back
/// out of the bucket of the previous reason. A reason in neither bucket only
/// touches science time.
pub fn reconcile_night_totals(
    totals: NightTimeTotals,
    transition: &StatusTransition,
    observation_time: i64,
) -> NightTimeTotals {
    let mut next = totals;

    match transition.category {
        TransitionCategory::AcceptToReject => {
            next.science_time -= observation_time;
            credit_lost_time(&mut next, transition.new_reason(), observation_time);
        }
        TransitionCategory::RejectToAccept => {
            next.science_time += observation_time;
            credit_lost_time(&mut next, transition.previous_reason(), -observation_time);
        }
        TransitionCategory::ReasonChangeWeatherToTechnical => {
            next.lost_time_to_weather -= observation_time;
            next.lost_time_to_problems += observation_time;
        }
        TransitionCategory::ReasonChangeTechnicalToWeather => {
            next.lost_time_to_problems -= observation_time;
            next.lost_time_to_weather += observation_time;
        }
        TransitionCategory::NoOp => {}
    }

    next
}

fn credit_lost_time(totals: &mut NightTimeTotals, reason: Option<RejectionReason>, delta: i64) {
    match reason.and_then(|r| r.lost_time_bucket()) {
        Some(LostTimeBucket::Weather) => totals.lost_time_to_weather += delta,
        Some(LostTimeBucket::Technical) => totals.lost_time_to_problems += delta,
        None => {}
    }
}

#[cfg(test)]
#[path = "night_accounting_tests.rs"]
mod night_accounting_tests;
