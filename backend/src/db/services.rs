//! High-level database service layer.
//!
//! Repository-agnostic operations that work with any implementation of
//! [`BlockVisitRepository`]. The HTTP handlers and the server binary go through
//! these functions rather than calling the repository directly.
//!
//! # Usage
//!
//! ```no_run
//! use observation_accounting::db::{services, repositories::LocalRepository};
//! use observation_accounting::models::BlockVisitId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = LocalRepository::new();
//!
//!     let visit = services::update_block_visit_status(&repo, BlockVisitId(1), "Accepted", None)
//!         .await?;
//!     println!("Block visit {} is now {}", visit.block_visit_id, visit.status);
//!
//!     Ok(())
//! }
//! ```

use log::{info, warn};

use super::repository::{BlockVisitRepository, RepositoryResult};
use crate::models::{Block, BlockId, BlockVisit, BlockVisitId, NightInfo, NightInfoId};
use crate::services::block_visit_status::{StatusChangeRequest, TransitionOutcome};

// ==================== Health & Connection ====================

/// Check if the database connection is healthy.
///
/// This is a simple pass-through to the repository's health check.
pub async fn health_check<R: BlockVisitRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

// ==================== Reads ====================

/// Get a block visit, deleted ones included.
pub async fn get_block_visit<R: BlockVisitRepository + ?Sized>(
    repo: &R,
    block_visit_id: BlockVisitId,
) -> RepositoryResult<BlockVisit> {
    repo.get_block_visit(block_visit_id).await
}

pub async fn get_block<R: BlockVisitRepository + ?Sized>(
    repo: &R,
    block_id: BlockId,
) -> RepositoryResult<Block> {
    repo.get_block(block_id).await
}

pub async fn get_night_info<R: BlockVisitRepository + ?Sized>(
    repo: &R,
    night_info_id: NightInfoId,
) -> RepositoryResult<NightInfo> {
    repo.get_night_info(night_info_id).await
}

// ==================== Status transitions ====================

/// Set the status of a block visit and reconcile its night and block.
///
/// `status` and `rejection_reason` are display names ("Rejected",
/// "Observing conditions not met"). Returns the visit as persisted; the whole
/// change is committed or nothing is.
///
/// # Errors
/// * `NotFound` if the visit does not exist or is deleted
/// * `ValidationError` if the status/reason combination is not allowed
/// * any persistence error, in which case no row was changed
pub async fn update_block_visit_status<R: BlockVisitRepository + ?Sized>(
    repo: &R,
    block_visit_id: BlockVisitId,
    status: &str,
    rejection_reason: Option<&str>,
) -> RepositoryResult<BlockVisit> {
    let request = StatusChangeRequest::new(block_visit_id, status, rejection_reason);
    apply_request(repo, &request)
        .await
        .map(|outcome| outcome.block_visit)
}

/// Like [`update_block_visit_status`] but returns the full outcome, including
/// the reconciled night totals and block counters.
pub async fn apply_request<R: BlockVisitRepository + ?Sized>(
    repo: &R,
    request: &StatusChangeRequest,
) -> RepositoryResult<TransitionOutcome> {
    match repo.update_block_visit_status(request).await {
        Ok(outcome) => {
            info!(
                "Block visit {} set to {} ({}); block {} is {} with {}/{} accepted",
                request.block_visit_id,
                outcome.block_visit.status,
                outcome.category,
                outcome.block_counters.block_id,
                outcome.block_counters.status,
                outcome.block_counters.accepted_observations,
                outcome.block_counters.requested_observations
            );
            Ok(outcome)
        }
        Err(e) => {
            warn!(
                "Status change of block visit {} to {} failed: {}",
                request.block_visit_id, request.status, e
            );
            Err(e)
        }
    }
}
