use chrono::NaiveDate;
use diesel::prelude::*;

use super::schema::{block_visits, blocks, night_infos};
use crate::db::repository::{Entity, RepositoryError, RepositoryResult};
use crate::models::{
    Block, BlockCounters, BlockId, BlockStatus, BlockVisit, BlockVisitId, BlockVisitStatus,
    NightInfo, NightInfoId, NightTimeTotals, RejectionReason, VisitState,
};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = night_infos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NightInfoRow {
    pub night_info_id: i64,
    pub night_date: NaiveDate,
    pub science_time_sec: i64,
    pub lost_time_weather_sec: i64,
    pub lost_time_problems_sec: i64,
}

impl From<NightInfoRow> for NightInfo {
    fn from(row: NightInfoRow) -> Self {
        NightInfo {
            night_info_id: NightInfoId(row.night_info_id),
            date: row.night_date,
            science_time: row.science_time_sec,
            lost_time_to_weather: row.lost_time_weather_sec,
            lost_time_to_problems: row.lost_time_problems_sec,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = blocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlockRow {
    pub block_id: i64,
    pub block_code: String,
    pub semester: String,
    pub requested_observations: i32,
    pub accepted_observations: i32,
    pub rejected_observations: i32,
    pub observation_time_sec: i64,
    pub block_status: String,
}

impl BlockRow {
    pub fn into_block(self) -> RepositoryResult<Block> {
        let status = BlockStatus::from_stored_name(&self.block_status)
            .map_err(|e| RepositoryError::corrupt_value(e, Entity::Block, self.block_id))?;
        Ok(Block {
            block_id: BlockId(self.block_id),
            code: self.block_code,
            semester: self.semester,
            requested_observations: self.requested_observations,
            accepted_observations: self.accepted_observations,
            rejected_observations: self.rejected_observations,
            observation_time: self.observation_time_sec,
            status,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = block_visits)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlockVisitRow {
    pub block_visit_id: i64,
    pub block_id: i64,
    pub night_info_id: i64,
    pub block_visit_status: String,
    pub rejection_reason: Option<String>,
}

impl BlockVisitRow {
    pub fn into_block_visit(
        self,
        night: NaiveDate,
        observation_time: i64,
    ) -> RepositoryResult<BlockVisit> {
        let block_visit_id = self.block_visit_id;
        let corrupt = |e| RepositoryError::corrupt_value(e, Entity::BlockVisit, block_visit_id);
        let status = BlockVisitStatus::from_stored_name(&self.block_visit_status).map_err(corrupt)?;
        let rejection_reason = self
            .rejection_reason
            .as_deref()
            .map(RejectionReason::from_stored_name)
            .transpose()
            .map_err(corrupt)?;
        Ok(BlockVisit {
            block_visit_id: BlockVisitId(self.block_visit_id),
            block_id: BlockId(self.block_id),
            night_info_id: NightInfoId(self.night_info_id),
            night,
            status,
            rejection_reason,
            observation_time,
        })
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = night_infos)]
pub struct NightTimeChangeset {
    pub science_time_sec: i64,
    pub lost_time_weather_sec: i64,
    pub lost_time_problems_sec: i64,
}

impl From<&NightTimeTotals> for NightTimeChangeset {
    fn from(totals: &NightTimeTotals) -> Self {
        Self {
            science_time_sec: totals.science_time,
            lost_time_weather_sec: totals.lost_time_to_weather,
            lost_time_problems_sec: totals.lost_time_to_problems,
        }
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = blocks)]
pub struct BlockCountersChangeset {
    pub accepted_observations: i32,
    pub rejected_observations: i32,
    pub block_status: &'static str,
}

impl From<&BlockCounters> for BlockCountersChangeset {
    fn from(counters: &BlockCounters) -> Self {
        Self {
            accepted_observations: counters.accepted_observations,
            rejected_observations: counters.rejected_observations,
            block_status: counters.status.stored_name(),
        }
    }
}

/// Status update of a visit. `None` clears the reason column.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = block_visits, treat_none_as_null = true)]
pub struct BlockVisitStatusChangeset {
    pub block_visit_status: &'static str,
    pub rejection_reason: Option<&'static str>,
}

impl From<&VisitState> for BlockVisitStatusChangeset {
    fn from(state: &VisitState) -> Self {
        Self {
            block_visit_status: state.status.stored_name(),
            rejection_reason: state.rejection_reason.map(|r| r.stored_name()),
        }
    }
}
