//! End-to-end status changes through the in-memory repository.
//!
//! Each test seeds a night, one or more blocks and a visit, applies status
//! changes through the public repository API and checks the persisted rows.

use chrono::NaiveDate;
use observation_accounting::db::repositories::{LocalRepository, NewBlock, WriteFault};
use observation_accounting::db::repository::{BlockVisitRepository, RepositoryError};
use observation_accounting::db::services;
use observation_accounting::models::{
    BlockId, BlockStatus, BlockVisitId, BlockVisitStatus, NightInfoId, RejectionReason,
};
use observation_accounting::services::{StatusChangeRequest, TransitionCategory};

const WEATHER: &str = "Observing conditions not met";
const INSTRUMENT: &str = "Instrument technical problems";
const TELESCOPE: &str = "Telescope technical problems";
const PHASE2: &str = "Phase 2 problem";

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
}

struct Fixture {
    repo: LocalRepository,
    night: NightInfoId,
    block: BlockId,
    visit: BlockVisitId,
}

fn block(requested: i32, accepted: i32, rejected: i32, status: BlockStatus) -> NewBlock {
    NewBlock {
        code: "BLK-42".to_string(),
        semester: "2024-1".to_string(),
        requested_observations: requested,
        accepted_observations: accepted,
        rejected_observations: rejected,
        observation_time: 1200,
        status,
    }
}

fn fixture(
    new_block: NewBlock,
    status: BlockVisitStatus,
    reason: Option<RejectionReason>,
) -> Fixture {
    let repo = LocalRepository::new();
    let night = repo.insert_night_info(date(), 10_000, 500, 200);
    let block = repo.insert_block(new_block);
    let visit = repo.insert_block_visit(block, night, status, reason).unwrap();
    Fixture {
        repo,
        night,
        block,
        visit,
    }
}

async fn set_status(
    fx: &Fixture,
    status: &str,
    reason: Option<&str>,
) -> Result<TransitionCategory, RepositoryError> {
    let request = StatusChangeRequest::new(fx.visit, status, reason);
    services::apply_request(&fx.repo, &request)
        .await
        .map(|outcome| outcome.category)
}

async fn night_totals(fx: &Fixture) -> (i64, i64, i64) {
    let night = fx.repo.get_night_info(fx.night).await.unwrap();
    (
        night.science_time,
        night.lost_time_to_weather,
        night.lost_time_to_problems,
    )
}

async fn block_state(repo: &LocalRepository, block: BlockId) -> (i32, i32, BlockStatus) {
    let block = repo.get_block(block).await.unwrap();
    (
        block.accepted_observations,
        block.rejected_observations,
        block.status,
    )
}

#[tokio::test]
async fn test_rejecting_for_weather_moves_time_and_counters() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);

    let category = set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap();

    assert_eq!(category, TransitionCategory::AcceptToReject);
    assert_eq!(night_totals(&fx).await, (8800, 1700, 200));
    assert_eq!(block_state(&fx.repo, fx.block).await, (4, 2, BlockStatus::Active));

    let visit = fx.repo.get_block_visit(fx.visit).await.unwrap();
    assert_eq!(visit.status, BlockVisitStatus::Rejected);
    assert_eq!(
        visit.rejection_reason,
        Some(RejectionReason::ObservingConditionsNotMet)
    );
}

#[tokio::test]
async fn test_accepting_a_technical_rejection_completes_the_block() {
    let fx = fixture(
        block(3, 2, 1, BlockStatus::Active),
        BlockVisitStatus::Rejected,
        Some(RejectionReason::TelescopeTechnicalProblems),
    );

    let category = set_status(&fx, "Accepted", None).await.unwrap();

    assert_eq!(category, TransitionCategory::RejectToAccept);
    assert_eq!(night_totals(&fx).await, (11_200, 500, -1000));
    assert_eq!(block_state(&fx.repo, fx.block).await, (3, 0, BlockStatus::Completed));

    let visit = fx.repo.get_block_visit(fx.visit).await.unwrap();
    assert_eq!(visit.rejection_reason, None);
}

#[tokio::test]
async fn test_completion_edge_round_trip() {
    let fx = fixture(block(3, 3, 0, BlockStatus::Completed), BlockVisitStatus::Accepted, None);

    set_status(&fx, "Rejected", Some(INSTRUMENT)).await.unwrap();
    assert_eq!(block_state(&fx.repo, fx.block).await, (2, 1, BlockStatus::Active));

    set_status(&fx, "Accepted", None).await.unwrap();
    assert_eq!(block_state(&fx.repo, fx.block).await, (3, 0, BlockStatus::Completed));
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
}

#[tokio::test]
async fn test_rejecting_leaves_on_hold_block_status_alone() {
    let fx = fixture(block(4, 4, 0, BlockStatus::OnHold), BlockVisitStatus::Accepted, None);

    set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap();

    assert_eq!(block_state(&fx.repo, fx.block).await, (3, 1, BlockStatus::OnHold));
}

#[tokio::test]
async fn test_accepting_up_to_requested_leaves_on_hold_block_status_alone() {
    let fx = fixture(
        block(3, 2, 1, BlockStatus::OnHold),
        BlockVisitStatus::Rejected,
        Some(RejectionReason::Other),
    );

    set_status(&fx, "Accepted", None).await.unwrap();

    assert_eq!(block_state(&fx.repo, fx.block).await, (3, 0, BlockStatus::OnHold));
}

#[tokio::test]
async fn test_reason_change_across_buckets_moves_lost_time_only() {
    let fx = fixture(
        block(6, 4, 2, BlockStatus::Active),
        BlockVisitStatus::Rejected,
        Some(RejectionReason::ObservingConditionsNotMet),
    );

    let category = set_status(&fx, "Rejected", Some(INSTRUMENT)).await.unwrap();
    assert_eq!(category, TransitionCategory::ReasonChangeWeatherToTechnical);
    assert_eq!(night_totals(&fx).await, (10_000, -700, 1400));
    assert_eq!(block_state(&fx.repo, fx.block).await, (4, 2, BlockStatus::Active));

    let category = set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap();
    assert_eq!(category, TransitionCategory::ReasonChangeTechnicalToWeather);
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
}

#[tokio::test]
async fn test_reason_change_within_a_bucket_only_updates_the_reason() {
    let fx = fixture(
        block(6, 4, 2, BlockStatus::Active),
        BlockVisitStatus::Rejected,
        Some(RejectionReason::InstrumentTechnicalProblems),
    );

    let category = set_status(&fx, "Rejected", Some(TELESCOPE)).await.unwrap();

    assert_eq!(category, TransitionCategory::NoOp);
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
    let visit = fx.repo.get_block_visit(fx.visit).await.unwrap();
    assert_eq!(
        visit.rejection_reason,
        Some(RejectionReason::TelescopeTechnicalProblems)
    );
}

#[tokio::test]
async fn test_unbucketed_reason_only_touches_science_time() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);

    set_status(&fx, "Rejected", Some(PHASE2)).await.unwrap();
    assert_eq!(night_totals(&fx).await, (8800, 500, 200));
    assert_eq!(block_state(&fx.repo, fx.block).await, (4, 2, BlockStatus::Active));

    set_status(&fx, "Accepted", None).await.unwrap();
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
}

#[tokio::test]
async fn test_repeating_a_request_is_idempotent() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);

    set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap();
    let totals = night_totals(&fx).await;
    let counters = block_state(&fx.repo, fx.block).await;

    let category = set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap();

    assert_eq!(category, TransitionCategory::NoOp);
    assert_eq!(night_totals(&fx).await, totals);
    assert_eq!(block_state(&fx.repo, fx.block).await, counters);
}

#[tokio::test]
async fn test_accepting_an_accepted_visit_changes_nothing() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);

    let category = set_status(&fx, "Accepted", None).await.unwrap();

    assert_eq!(category, TransitionCategory::NoOp);
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
    assert_eq!(block_state(&fx.repo, fx.block).await, (5, 1, BlockStatus::Active));
}

#[tokio::test]
async fn test_queued_visit_is_set_without_accounting() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Queued, None);

    let category = set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap();

    assert_eq!(category, TransitionCategory::NoOp);
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
    assert_eq!(block_state(&fx.repo, fx.block).await, (5, 1, BlockStatus::Active));
    let visit = fx.repo.get_block_visit(fx.visit).await.unwrap();
    assert_eq!(visit.status, BlockVisitStatus::Rejected);
}

#[tokio::test]
async fn test_deleted_visit_is_not_found_and_nothing_changes() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);
    fx.repo.delete_block_visit(fx.visit).unwrap();

    let err = set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
    assert_eq!(block_state(&fx.repo, fx.block).await, (5, 1, BlockStatus::Active));
    let visit = fx.repo.get_block_visit(fx.visit).await.unwrap();
    assert_eq!(visit.status, BlockVisitStatus::Deleted);
}

#[tokio::test]
async fn test_unknown_visit_is_not_found() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);
    let request = StatusChangeRequest::new(BlockVisitId(404), "Accepted", None);

    let err = fx.repo.update_block_visit_status(&request).await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_invalid_combinations_are_rejected_before_any_write() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);

    for (status, reason) in [
        ("Rejected", None),
        ("Accepted", Some(WEATHER)),
        ("Deleted", None),
        ("Rejected", Some("Cloudy")),
    ] {
        let err = set_status(&fx, status, reason).await.unwrap_err();
        assert!(err.is_validation(), "{status} / {reason:?}");
    }

    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
    assert_eq!(block_state(&fx.repo, fx.block).await, (5, 1, BlockStatus::Active));
}

#[tokio::test]
async fn test_counters_land_on_the_authoritative_block() {
    let repo = LocalRepository::new();
    let night = repo.insert_night_info(date(), 10_000, 0, 0);
    let original = repo.insert_block(NewBlock {
        observation_time: 600,
        ..block(4, 2, 0, BlockStatus::Superseded)
    });
    let resubmitted = repo.insert_block(NewBlock {
        observation_time: 900,
        ..block(4, 3, 0, BlockStatus::Active)
    });
    let visit = repo
        .insert_block_visit(original, night, BlockVisitStatus::Accepted, None)
        .unwrap();

    services::update_block_visit_status(&repo, visit, "Rejected", Some(WEATHER))
        .await
        .unwrap();

    assert_eq!(block_state(&repo, original).await, (2, 0, BlockStatus::Superseded));
    assert_eq!(block_state(&repo, resubmitted).await, (2, 1, BlockStatus::Active));

    // Time comes from the block the visit was observed for.
    let night = repo.get_night_info(night).await.unwrap();
    assert_eq!(night.science_time, 9400);
    assert_eq!(night.lost_time_to_weather, 600);
}

#[tokio::test]
async fn test_failed_write_rolls_back_every_row() {
    for fault in [WriteFault::NightInfo, WriteFault::Block, WriteFault::BlockVisit] {
        let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);
        fx.repo.fail_next_write(fault);

        let err = set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap_err();

        assert!(
            matches!(err, RepositoryError::TransactionError { .. }),
            "{fault:?}: {err}"
        );
        assert_eq!(night_totals(&fx).await, (10_000, 500, 200), "{fault:?}");
        assert_eq!(
            block_state(&fx.repo, fx.block).await,
            (5, 1, BlockStatus::Active),
            "{fault:?}"
        );
        let visit = fx.repo.get_block_visit(fx.visit).await.unwrap();
        assert_eq!(visit.status, BlockVisitStatus::Accepted, "{fault:?}");

        // The fault only applies once; retrying succeeds.
        set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap();
        assert_eq!(night_totals(&fx).await, (8800, 1700, 200), "{fault:?}");
    }
}

#[tokio::test]
async fn test_pending_fault_survives_a_request_that_never_writes() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);
    fx.repo.fail_next_write(WriteFault::NightInfo);

    let err = set_status(&fx, "Rejected", None).await.unwrap_err();
    assert!(err.is_validation());

    let err = set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap_err();
    assert!(matches!(err, RepositoryError::TransactionError { .. }), "{err}");
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));

    set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap();
    assert_eq!(night_totals(&fx).await, (8800, 1700, 200));
}

#[tokio::test]
async fn test_unhealthy_repository_refuses_changes() {
    let fx = fixture(block(6, 5, 1, BlockStatus::Active), BlockVisitStatus::Accepted, None);
    fx.repo.set_healthy(false);

    let err = set_status(&fx, "Rejected", Some(WEATHER)).await.unwrap_err();

    assert!(err.is_retryable());
    fx.repo.set_healthy(true);
    assert_eq!(night_totals(&fx).await, (10_000, 500, 200));
}

#[tokio::test]
async fn test_concurrent_changes_to_one_night_are_serialized() {
    let repo = LocalRepository::new();
    let night = repo.insert_night_info(date(), 100_000, 0, 0);
    let block = repo.insert_block(block(20, 20, 0, BlockStatus::Completed));
    let mut visits = Vec::new();
    for _ in 0..10 {
        visits.push(
            repo.insert_block_visit(block, night, BlockVisitStatus::Accepted, None)
                .unwrap(),
        );
    }

    let handles: Vec<_> = visits
        .into_iter()
        .map(|visit| {
            let repo = repo.clone();
            tokio::spawn(async move {
                services::update_block_visit_status(&repo, visit, "Rejected", Some(WEATHER)).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let night = repo.get_night_info(night).await.unwrap();
    assert_eq!(night.science_time, 100_000 - 10 * 1200);
    assert_eq!(night.lost_time_to_weather, 10 * 1200);
    assert_eq!(block_state(&repo, block).await, (10, 10, BlockStatus::Active));
}
