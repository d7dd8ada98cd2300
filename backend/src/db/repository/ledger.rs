//! Transaction-scoped access to the rows touched by a status transition.
//!
//! A [`VisitLedger`] is only ever handed out inside an open transaction. Reads
//! of the night and the authoritative block lock their rows until the
//! transaction ends, and writes become visible only when it commits. This is
//! the seam between the storage-agnostic orchestration in
//! [`crate::services::block_visit_status`] and each repository backend.

use super::error::RepositoryResult;
use crate::models::{
    BlockCounters, BlockVisit, BlockVisitId, NightInfoId, NightTimeTotals, VisitState,
};

pub trait VisitLedger {
    /// Read a block visit, whatever its status.
    ///
    /// Fails with `NotFound` for unknown ids.
    fn read_block_visit(&mut self, block_visit_id: BlockVisitId) -> RepositoryResult<BlockVisit>;

    /// Read and lock the time totals of a night.
    fn read_night_info(&mut self, night_info_id: NightInfoId) -> RepositoryResult<NightTimeTotals>;

    /// Read and lock the counters of the authoritative block for a visit: the
    /// block with the highest id among those sharing the semester and code of
    /// the visit's own block.
    fn resolve_authoritative_block(
        &mut self,
        block_visit_id: BlockVisitId,
    ) -> RepositoryResult<BlockCounters>;

    /// Observation time in seconds, as configured on the visit's block.
    fn lookup_observation_time(&mut self, block_visit_id: BlockVisitId) -> RepositoryResult<i64>;

    fn write_night_info(
        &mut self,
        night_info_id: NightInfoId,
        totals: &NightTimeTotals,
    ) -> RepositoryResult<()>;

    fn write_block_counters(&mut self, counters: &BlockCounters) -> RepositoryResult<()>;

    /// Persist the visit's own status and reason.
    ///
    /// Must refuse, with `NotFound`, to touch a visit whose stored status is
    /// `Deleted` at write time.
    fn write_block_visit_status(
        &mut self,
        block_visit_id: BlockVisitId,
        state: &VisitState,
    ) -> RepositoryResult<BlockVisit>;
}
