//! Block visits, blocks and night records as seen by the accounting engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::status::{BlockStatus, BlockVisitStatus, RejectionReason};
use crate::define_id_type;

define_id_type!(i64, BlockVisitId);
define_id_type!(i64, BlockId);
define_id_type!(i64, NightInfoId);

/// One executed attempt to observe a block on a given night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVisit {
    pub block_visit_id: BlockVisitId,
    pub block_id: BlockId,
    pub night_info_id: NightInfoId,
    pub night: NaiveDate,
    pub status: BlockVisitStatus,
    /// Present iff `status` is `Rejected`.
    pub rejection_reason: Option<RejectionReason>,
    /// Seconds; inherited from the block.
    pub observation_time: i64,
}

impl BlockVisit {
    pub fn state(&self) -> VisitState {
        VisitState {
            status: self.status,
            rejection_reason: self.rejection_reason,
        }
    }
}

/// A schedulable unit of observation.
///
/// Resubmissions of the same block within a semester share `code`; only the
/// row with the highest id for a `(semester, code)` pair carries live counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: BlockId,
    pub code: String,
    pub semester: String,
    pub requested_observations: i32,
    pub accepted_observations: i32,
    pub rejected_observations: i32,
    /// Configured total observation time in seconds.
    pub observation_time: i64,
    pub status: BlockStatus,
}

impl Block {
    pub fn counters(&self) -> BlockCounters {
        BlockCounters {
            block_id: self.block_id,
            requested_observations: self.requested_observations,
            accepted_observations: self.accepted_observations,
            rejected_observations: self.rejected_observations,
            status: self.status,
        }
    }
}

/// Per-night time accounting record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightInfo {
    pub night_info_id: NightInfoId,
    pub date: NaiveDate,
    pub science_time: i64,
    pub lost_time_to_weather: i64,
    pub lost_time_to_problems: i64,
}

impl NightInfo {
    pub fn totals(&self) -> NightTimeTotals {
        NightTimeTotals {
            science_time: self.science_time,
            lost_time_to_weather: self.lost_time_to_weather,
            lost_time_to_problems: self.lost_time_to_problems,
        }
    }

    pub fn apply_totals(&mut self, totals: &NightTimeTotals) {
        self.science_time = totals.science_time;
        self.lost_time_to_weather = totals.lost_time_to_weather;
        self.lost_time_to_problems = totals.lost_time_to_problems;
    }
}

/// The `(status, rejection_reason)` pair of a block visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitState {
    pub status: BlockVisitStatus,
    pub rejection_reason: Option<RejectionReason>,
}

impl VisitState {
    pub fn accepted() -> Self {
        Self {
            status: BlockVisitStatus::Accepted,
            rejection_reason: None,
        }
    }

    pub fn rejected(reason: RejectionReason) -> Self {
        Self {
            status: BlockVisitStatus::Rejected,
            rejection_reason: Some(reason),
        }
    }
}

/// Time totals of a night, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightTimeTotals {
    pub science_time: i64,
    pub lost_time_to_weather: i64,
    pub lost_time_to_problems: i64,
}

impl NightTimeTotals {
    pub fn sum(&self) -> i64 {
        self.science_time + self.lost_time_to_weather + self.lost_time_to_problems
    }
}

/// Completion counters and lifecycle status of the authoritative block row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounters {
    pub block_id: BlockId,
    pub requested_observations: i32,
    pub accepted_observations: i32,
    pub rejected_observations: i32,
    pub status: BlockStatus,
}
