//! Setting the status of a block visit.
//!
//! [`apply_status_change`] is the whole read-modify-write sequence of a status
//! change. It runs against a [`VisitLedger`], which each repository backend
//! hands out inside one transaction, so either every write below is committed
//! or none is:
//!
//! 1. load the visit (`NotFound` if unknown or deleted)
//! 2. validate the requested status and reason (`ValidationError`)
//! 3. load and lock the night totals and the authoritative block counters
//! 4. classify the change
//! 5. reconcile night totals and block counters
//! 6. write the night, then the block, then the visit itself

use log::debug;
use serde::{Deserialize, Serialize};

use super::block_counters::reconcile_block_counters;
use super::night_accounting::reconcile_night_totals;
use super::transition::{StatusTransition, TransitionCategory};
use crate::db::repository::{Entity, RepositoryError, RepositoryResult, VisitLedger};
use crate::models::{
    BlockCounters, BlockVisit, BlockVisitId, BlockVisitStatus, NightTimeTotals, RejectionReason,
    VisitState,
};

const OPERATION: &str = "update_block_visit_status";

/// A request to set the status of a block visit, as received from a caller.
///
/// Status and reason are display names and are only trusted after
/// [`parse_requested_state`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub block_visit_id: BlockVisitId,
    pub status: String,
    pub rejection_reason: Option<String>,
}

impl StatusChangeRequest {
    pub fn new(
        block_visit_id: BlockVisitId,
        status: impl Into<String>,
        rejection_reason: Option<&str>,
    ) -> Self {
        Self {
            block_visit_id,
            status: status.into(),
            rejection_reason: rejection_reason.map(str::to_string),
        }
    }
}

/// A committed status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub block_visit: BlockVisit,
    pub category: TransitionCategory,
    pub night_totals: NightTimeTotals,
    pub block_counters: BlockCounters,
}

/// Parse and validate a requested `(status, reason)` pair.
///
/// Only Accepted and Rejected can be requested. A rejection needs a reason and
/// an acceptance must not have one.
pub fn parse_requested_state(
    status: &str,
    rejection_reason: Option<&str>,
) -> RepositoryResult<VisitState> {
    let validation = |message: String| RepositoryError::validation(message).in_operation(OPERATION);

    let status = BlockVisitStatus::from_display_name(status).map_err(|e| validation(e.to_string()))?;
    let reason = rejection_reason
        .map(RejectionReason::from_display_name)
        .transpose()
        .map_err(|e| validation(e.to_string()))?;

    match (status, reason) {
        (BlockVisitStatus::Rejected, Some(reason)) => Ok(VisitState::rejected(reason)),
        (BlockVisitStatus::Rejected, None) => Err(validation(
            "A rejected block visit requires a rejection reason".to_string(),
        )),
        (BlockVisitStatus::Accepted, None) => Ok(VisitState::accepted()),
        (BlockVisitStatus::Accepted, Some(reason)) => Err(validation(format!(
            "A rejection reason ({}) is only allowed for rejected block visits",
            reason
        ))),
        (other, _) => Err(validation(format!(
            "Block visit status cannot be set to {}",
            other
        ))),
    }
}

/// Apply a status change through `ledger`. See the module docs for the sequence.
pub fn apply_status_change<L: VisitLedger + ?Sized>(
    ledger: &mut L,
    request: &StatusChangeRequest,
) -> RepositoryResult<TransitionOutcome> {
    let block_visit_id = request.block_visit_id;

    let visit = ledger
        .read_block_visit(block_visit_id)
        .map_err(|e| e.in_operation(OPERATION))?;
    if visit.status.is_deleted() {
        return Err(
            RepositoryError::not_found(Entity::BlockVisit, block_visit_id.value(), OPERATION)
                .with_details("status=Deleted"),
        );
    }

    let requested = parse_requested_state(&request.status, request.rejection_reason.as_deref())?;

    let night_totals = ledger.read_night_info(visit.night_info_id)?;
    let block_counters = ledger.resolve_authoritative_block(block_visit_id)?;

    let transition = StatusTransition::classify(visit.state(), requested);
    debug!(
        "Block visit {}: {:?} -> {:?} classified as {}",
        block_visit_id, transition.from, transition.to, transition.category
    );

    let observation_time = ledger.lookup_observation_time(block_visit_id)?;
    if transition.category != TransitionCategory::NoOp && observation_time <= 0 {
        return Err(RepositoryError::internal(format!(
            "Non-positive observation time: {}",
            observation_time
        ))
        .in_operation(OPERATION)
        .for_row(Entity::Block, visit.block_id.value()));
    }

    let next_totals = reconcile_night_totals(night_totals, &transition, observation_time);
    let next_counters = reconcile_block_counters(block_counters, &transition);

    ledger.write_night_info(visit.night_info_id, &next_totals)?;
    ledger.write_block_counters(&next_counters)?;
    let block_visit = ledger.write_block_visit_status(block_visit_id, &requested)?;

    Ok(TransitionOutcome {
        block_visit,
        category: transition.category,
        night_totals: next_totals,
        block_counters: next_counters,
    })
}

#[cfg(test)]
#[path = "block_visit_status_tests.rs"]
mod block_visit_status_tests;
