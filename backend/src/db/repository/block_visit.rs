//! Repository trait for block visits and the aggregates they feed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::RepositoryResult;
use crate::models::{Block, BlockId, BlockVisit, BlockVisitId, NightInfo, NightInfoId};
use crate::services::block_visit_status::{StatusChangeRequest, TransitionOutcome};

/// Connection pool counters, reported by backends that keep a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub connections_in_use: u32,
    pub idle_connections: u32,
    pub max_size: u32,
    pub total_queries: u64,
    pub failed_queries: u64,
    pub retried_operations: u64,
}

/// Repository trait for block visit accounting.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait BlockVisitRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the database connection is healthy.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Pool counters; `None` for backends without a connection pool.
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }

    // ==================== Reads ====================

    /// Get a block visit by ID, including deleted ones.
    async fn get_block_visit(&self, block_visit_id: BlockVisitId) -> RepositoryResult<BlockVisit>;

    /// Get a block row by ID (not resolved to the authoritative row).
    async fn get_block(&self, block_id: BlockId) -> RepositoryResult<Block>;

    async fn get_night_info(&self, night_info_id: NightInfoId) -> RepositoryResult<NightInfo>;

    // ==================== Status transitions ====================

    /// Change the status of a block visit and reconcile the night and block
    /// aggregates, all in one transaction.
    ///
    /// # Returns
    /// * `Ok(TransitionOutcome)` - The committed transition
    /// * `Err(RepositoryError::NotFound)` - Unknown or deleted visit, missing night or block
    /// * `Err(RepositoryError::ValidationError)` - Invalid status/reason combination
    /// * `Err(RepositoryError)` - Persistence failed; nothing was written
    async fn update_block_visit_status(
        &self,
        request: &StatusChangeRequest,
    ) -> RepositoryResult<TransitionOutcome>;
}
