//! In-memory local repository implementation.
//!
//! This module provides a local implementation of the repository traits
//! suitable for unit testing and local development. Rows are kept in memory in
//! their stored representation (statuses as stored names), so the same
//! serialization tables are exercised as with Postgres.
//!
//! A status change holds the write lock for its whole duration, which plays the
//! role of the row locks taken by the Postgres backend. Writes are staged on
//! copies of the touched rows and only copied back once the change succeeded.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::repository::*;
use crate::models::*;
use crate::services::block_visit_status::{
    apply_status_change, StatusChangeRequest, TransitionOutcome,
};

/// Which write of a status change should fail, for exercising rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    NightInfo,
    Block,
    BlockVisit,
}

/// Data for seeding a block row, standing in for proposal submission.
#[derive(Debug, Clone)]
pub struct NewBlock {
    pub code: String,
    pub semester: String,
    pub requested_observations: i32,
    pub accepted_observations: i32,
    pub rejected_observations: i32,
    pub observation_time: i64,
    pub status: BlockStatus,
}

#[derive(Debug, Clone)]
struct BlockVisitRow {
    block_visit_id: BlockVisitId,
    block_id: BlockId,
    night_info_id: NightInfoId,
    night: NaiveDate,
    status: String,
    rejection_reason: Option<String>,
}

#[derive(Debug, Clone)]
struct BlockRow {
    block_id: BlockId,
    code: String,
    semester: String,
    requested_observations: i32,
    accepted_observations: i32,
    rejected_observations: i32,
    observation_time: i64,
    status: String,
}

impl BlockRow {
    fn to_block(&self) -> RepositoryResult<Block> {
        let status = BlockStatus::from_stored_name(&self.status)
            .map_err(|e| RepositoryError::corrupt_value(e, Entity::Block, self.block_id.value()))?;
        Ok(Block {
            block_id: self.block_id,
            code: self.code.clone(),
            semester: self.semester.clone(),
            requested_observations: self.requested_observations,
            accepted_observations: self.accepted_observations,
            rejected_observations: self.rejected_observations,
            observation_time: self.observation_time,
            status,
        })
    }
}

impl BlockVisitRow {
    fn to_block_visit(&self, observation_time: i64) -> RepositoryResult<BlockVisit> {
        let corrupt =
            |e| RepositoryError::corrupt_value(e, Entity::BlockVisit, self.block_visit_id.value());
        let status = BlockVisitStatus::from_stored_name(&self.status).map_err(corrupt)?;
        let rejection_reason = self
            .rejection_reason
            .as_deref()
            .map(RejectionReason::from_stored_name)
            .transpose()
            .map_err(corrupt)?;
        Ok(BlockVisit {
            block_visit_id: self.block_visit_id,
            block_id: self.block_id,
            night_info_id: self.night_info_id,
            night: self.night,
            status,
            rejection_reason,
            observation_time,
        })
    }
}

/// In-memory local repository.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use observation_accounting::db::repositories::local::{LocalRepository, NewBlock};
/// use observation_accounting::models::{BlockStatus, BlockVisitStatus};
///
/// let repo = LocalRepository::new();
/// let night = repo.insert_night_info(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 10_000, 0, 0);
/// let block = repo.insert_block(NewBlock {
///     code: "B-1".into(),
///     semester: "2024-1".into(),
///     requested_observations: 2,
///     accepted_observations: 1,
///     rejected_observations: 0,
///     observation_time: 900,
///     status: BlockStatus::Active,
/// });
/// let visit = repo
///     .insert_block_visit(block, night, BlockVisitStatus::Accepted, None)
///     .unwrap();
/// assert_eq!(visit.value(), 1);
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    block_visits: HashMap<BlockVisitId, BlockVisitRow>,
    blocks: HashMap<BlockId, BlockRow>,
    night_infos: HashMap<NightInfoId, NightInfo>,

    // ID counters
    next_block_visit_id: i64,
    next_block_id: i64,
    next_night_info_id: i64,

    // Connection health
    is_healthy: bool,

    // Fault injection for the next status change
    fail_next_write: Option<WriteFault>,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            block_visits: HashMap::new(),
            blocks: HashMap::new(),
            night_infos: HashMap::new(),
            next_block_visit_id: 1,
            next_block_id: 1,
            next_night_info_id: 1,
            is_healthy: true,
            fail_next_write: None,
        }
    }
}

impl LocalData {
    fn block_row(&self, block_id: BlockId) -> RepositoryResult<&BlockRow> {
        self.blocks
            .get(&block_id)
            .ok_or_else(|| RepositoryError::not_found(Entity::Block, block_id.value(), "read_block"))
    }

    fn block_visit_row(&self, block_visit_id: BlockVisitId) -> RepositoryResult<&BlockVisitRow> {
        self.block_visits.get(&block_visit_id).ok_or_else(|| {
            RepositoryError::not_found(Entity::BlockVisit, block_visit_id.value(), "read_block_visit")
        })
    }

    fn night_info(&self, night_info_id: NightInfoId) -> RepositoryResult<&NightInfo> {
        self.night_infos.get(&night_info_id).ok_or_else(|| {
            RepositoryError::not_found(Entity::NightInfo, night_info_id.value(), "read_night_info")
        })
    }

    fn block_visit(&self, block_visit_id: BlockVisitId) -> RepositoryResult<BlockVisit> {
        let row = self.block_visit_row(block_visit_id)?;
        let observation_time = self.block_row(row.block_id)?.observation_time;
        row.to_block_visit(observation_time)
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Add a night record and return its assigned ID.
    pub fn insert_night_info(
        &self,
        date: NaiveDate,
        science_time: i64,
        lost_time_to_weather: i64,
        lost_time_to_problems: i64,
    ) -> NightInfoId {
        let mut data = self.data.write();
        let night_info_id = NightInfoId(data.next_night_info_id);
        data.next_night_info_id += 1;
        data.night_infos.insert(
            night_info_id,
            NightInfo {
                night_info_id,
                date,
                science_time,
                lost_time_to_weather,
                lost_time_to_problems,
            },
        );
        night_info_id
    }

    /// Add a block row and return its assigned ID.
    ///
    /// IDs increase monotonically, so a later insert with the same semester
    /// and code becomes the authoritative row.
    pub fn insert_block(&self, block: NewBlock) -> BlockId {
        let mut data = self.data.write();
        let block_id = BlockId(data.next_block_id);
        data.next_block_id += 1;
        data.blocks.insert(
            block_id,
            BlockRow {
                block_id,
                code: block.code,
                semester: block.semester,
                requested_observations: block.requested_observations,
                accepted_observations: block.accepted_observations,
                rejected_observations: block.rejected_observations,
                observation_time: block.observation_time,
                status: block.status.stored_name().to_string(),
            },
        );
        block_id
    }

    /// Add a block visit and return its assigned ID.
    ///
    /// The block and night must exist, and a reason must be given iff the
    /// visit is rejected.
    pub fn insert_block_visit(
        &self,
        block_id: BlockId,
        night_info_id: NightInfoId,
        status: BlockVisitStatus,
        rejection_reason: Option<RejectionReason>,
    ) -> RepositoryResult<BlockVisitId> {
        let mut data = self.data.write();
        data.block_row(block_id)?;
        let night = data.night_info(night_info_id)?.date;

        if (status == BlockVisitStatus::Rejected) != rejection_reason.is_some() {
            return Err(RepositoryError::validation(
                "A rejection reason must be given iff the block visit is rejected",
            )
            .in_operation("insert_block_visit"));
        }

        let block_visit_id = BlockVisitId(data.next_block_visit_id);
        data.next_block_visit_id += 1;
        data.block_visits.insert(
            block_visit_id,
            BlockVisitRow {
                block_visit_id,
                block_id,
                night_info_id,
                night,
                status: status.stored_name().to_string(),
                rejection_reason: rejection_reason.map(|r| r.stored_name().to_string()),
            },
        );
        Ok(block_visit_id)
    }

    /// Mark a block visit as deleted, as the ingestion side does.
    pub fn delete_block_visit(&self, block_visit_id: BlockVisitId) -> RepositoryResult<()> {
        let mut data = self.data.write();
        let row = data.block_visits.get_mut(&block_visit_id).ok_or_else(|| {
            RepositoryError::not_found(
                Entity::BlockVisit,
                block_visit_id.value(),
                "delete_block_visit",
            )
        })?;
        row.status = BlockVisitStatus::Deleted.stored_name().to_string();
        row.rejection_reason = None;
        Ok(())
    }

    /// Make the next status change that reaches the given write fail there.
    pub fn fail_next_write(&self, fault: WriteFault) {
        self.data.write().fail_next_write = Some(fault);
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// Staged view over [`LocalData`] for one status change.
struct LocalLedger<'a> {
    data: &'a LocalData,
    block_visits: HashMap<BlockVisitId, BlockVisitRow>,
    blocks: HashMap<BlockId, BlockRow>,
    night_infos: HashMap<NightInfoId, NightInfo>,
    fault: Option<WriteFault>,
    fault_fired: bool,
}

/// Rows written by a successful status change.
struct StagedChanges {
    block_visits: HashMap<BlockVisitId, BlockVisitRow>,
    blocks: HashMap<BlockId, BlockRow>,
    night_infos: HashMap<NightInfoId, NightInfo>,
}

impl StagedChanges {
    fn commit(self, data: &mut LocalData) {
        data.night_infos.extend(self.night_infos);
        data.blocks.extend(self.blocks);
        data.block_visits.extend(self.block_visits);
    }
}

impl<'a> LocalLedger<'a> {
    fn new(data: &'a LocalData, fault: Option<WriteFault>) -> Self {
        Self {
            data,
            block_visits: HashMap::new(),
            blocks: HashMap::new(),
            night_infos: HashMap::new(),
            fault,
            fault_fired: false,
        }
    }

    fn into_changes(self) -> StagedChanges {
        StagedChanges {
            block_visits: self.block_visits,
            blocks: self.blocks,
            night_infos: self.night_infos,
        }
    }

    fn block_visit_row(&self, block_visit_id: BlockVisitId) -> RepositoryResult<BlockVisitRow> {
        match self.block_visits.get(&block_visit_id) {
            Some(row) => Ok(row.clone()),
            None => self.data.block_visit_row(block_visit_id).cloned(),
        }
    }

    fn block_row(&self, block_id: BlockId) -> RepositoryResult<BlockRow> {
        match self.blocks.get(&block_id) {
            Some(row) => Ok(row.clone()),
            None => self.data.block_row(block_id).cloned(),
        }
    }

    fn check_fault(&mut self, write: WriteFault) -> RepositoryResult<()> {
        if self.fault == Some(write) {
            self.fault_fired = true;
            return Err(RepositoryError::transaction(format!(
                "Injected failure while writing {:?}",
                write
            ))
            .in_operation("update_block_visit_status"));
        }
        Ok(())
    }
}

impl VisitLedger for LocalLedger<'_> {
    fn read_block_visit(&mut self, block_visit_id: BlockVisitId) -> RepositoryResult<BlockVisit> {
        let row = self.block_visit_row(block_visit_id)?;
        let observation_time = self.block_row(row.block_id)?.observation_time;
        row.to_block_visit(observation_time)
    }

    fn read_night_info(&mut self, night_info_id: NightInfoId) -> RepositoryResult<NightTimeTotals> {
        match self.night_infos.get(&night_info_id) {
            Some(night) => Ok(night.totals()),
            None => self.data.night_info(night_info_id).map(NightInfo::totals),
        }
    }

    fn resolve_authoritative_block(
        &mut self,
        block_visit_id: BlockVisitId,
    ) -> RepositoryResult<BlockCounters> {
        let visit = self.block_visit_row(block_visit_id)?;
        let own = self.block_row(visit.block_id)?;

        let authoritative_id = self
            .data
            .blocks
            .values()
            .filter(|b| b.semester == own.semester && b.code == own.code)
            .map(|b| b.block_id)
            .max()
            .ok_or_else(|| {
                RepositoryError::not_found(
                    Entity::BlockVisit,
                    block_visit_id.value(),
                    "resolve_authoritative_block",
                )
                .with_details(format!("semester={}, code={}", own.semester, own.code))
            })?;

        Ok(self.block_row(authoritative_id)?.to_block()?.counters())
    }

    fn lookup_observation_time(&mut self, block_visit_id: BlockVisitId) -> RepositoryResult<i64> {
        let visit = self.block_visit_row(block_visit_id)?;
        Ok(self.block_row(visit.block_id)?.observation_time)
    }

    fn write_night_info(
        &mut self,
        night_info_id: NightInfoId,
        totals: &NightTimeTotals,
    ) -> RepositoryResult<()> {
        self.check_fault(WriteFault::NightInfo)?;
        let mut night = match self.night_infos.get(&night_info_id) {
            Some(night) => night.clone(),
            None => self.data.night_info(night_info_id)?.clone(),
        };
        night.apply_totals(totals);
        self.night_infos.insert(night_info_id, night);
        Ok(())
    }

    fn write_block_counters(&mut self, counters: &BlockCounters) -> RepositoryResult<()> {
        self.check_fault(WriteFault::Block)?;
        let mut row = self.block_row(counters.block_id)?;
        row.accepted_observations = counters.accepted_observations;
        row.rejected_observations = counters.rejected_observations;
        row.status = counters.status.stored_name().to_string();
        self.blocks.insert(counters.block_id, row);
        Ok(())
    }

    fn write_block_visit_status(
        &mut self,
        block_visit_id: BlockVisitId,
        state: &VisitState,
    ) -> RepositoryResult<BlockVisit> {
        self.check_fault(WriteFault::BlockVisit)?;
        let mut row = self.block_visit_row(block_visit_id)?;
        if row.status == BlockVisitStatus::Deleted.stored_name() {
            return Err(RepositoryError::not_found(
                Entity::BlockVisit,
                block_visit_id.value(),
                "write_block_visit_status",
            )
            .with_details("status=Deleted"));
        }

        row.status = state.status.stored_name().to_string();
        row.rejection_reason = state.rejection_reason.map(|r| r.stored_name().to_string());
        let observation_time = self.block_row(row.block_id)?.observation_time;
        let visit = row.to_block_visit(observation_time)?;
        self.block_visits.insert(block_visit_id, row);
        Ok(visit)
    }
}

#[async_trait]
impl BlockVisitRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn get_block_visit(&self, block_visit_id: BlockVisitId) -> RepositoryResult<BlockVisit> {
        self.check_health()?;
        self.data.read().block_visit(block_visit_id)
    }

    async fn get_block(&self, block_id: BlockId) -> RepositoryResult<Block> {
        self.check_health()?;
        self.data.read().block_row(block_id)?.to_block()
    }

    async fn get_night_info(&self, night_info_id: NightInfoId) -> RepositoryResult<NightInfo> {
        self.check_health()?;
        self.data.read().night_info(night_info_id).cloned()
    }

    async fn update_block_visit_status(
        &self,
        request: &StatusChangeRequest,
    ) -> RepositoryResult<TransitionOutcome> {
        self.check_health()?;

        let mut data = self.data.write();
        let fault = data.fail_next_write;

        let (result, fault_fired, changes) = {
            let mut ledger = LocalLedger::new(&data, fault);
            let result = apply_status_change(&mut ledger, request);
            (result, ledger.fault_fired, ledger.into_changes())
        };

        // A pending fault is spent only by the write it targets.
        if fault_fired {
            data.fail_next_write = None;
        }
        let outcome = result?;
        changes.commit(&mut data);
        Ok(outcome)
    }
}
