//! Postgres repository implementation using Diesel.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Reads and health checks retried on transient failures
//! - Status changes in a single transaction with `SELECT ... FOR UPDATE`,
//!   attempted exactly once
//! - Pool counters reported through [`BlockVisitRepository::pool_stats`]
//! - Embedded migrations run on startup
//!
//! Connection settings come from [`PostgresConfig`].

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

use crate::db::repo_config::PostgresConfig;
use crate::db::repository::{
    BlockVisitRepository, Entity, PoolStats, RepositoryError, RepositoryResult, VisitLedger,
};
use crate::models::{
    Block, BlockCounters, BlockId, BlockVisit, BlockVisitId, BlockVisitStatus, NightInfo,
    NightInfoId, NightTimeTotals, VisitState,
};
use crate::services::block_visit_status::{
    apply_status_change, StatusChangeRequest, TransitionOutcome,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// How many times a unit of work may run.
#[derive(Debug, Clone, Copy)]
enum Attempts {
    Once,
    /// Retry retryable errors up to `max_retries` times, doubling the delay.
    Retrying { max_retries: u32, first_delay: Duration },
}

impl Attempts {
    fn allows_retry(self, attempt: u32) -> Option<Duration> {
        match self {
            Attempts::Once => None,
            Attempts::Retrying {
                max_retries,
                first_delay,
            } => (attempt <= max_retries).then(|| first_delay * 2u32.pow(attempt - 1)),
        }
    }
}

#[derive(Debug, Default)]
struct QueryCounters {
    total: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    counters: Arc<QueryCounters>,
}

impl PostgresRepository {
    /// Connect, then run pending migrations on one pooled connection.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection(e.to_string())
                    .in_operation("create_pool")
                    .with_details(format!("max_size={}", config.max_pool_size))
            })?;

        let mut conn = pool
            .get()
            .map_err(|e| RepositoryError::from(e).in_operation("run_migrations"))?;
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal(format!("Migration failed: {}", e))
                .in_operation("run_migrations")
        })?;
        drop(conn);

        Ok(Self {
            pool,
            config,
            counters: Arc::default(),
        })
    }

    fn read_attempts(&self) -> Attempts {
        Attempts::Retrying {
            max_retries: self.config.max_retries,
            first_delay: Duration::from_millis(self.config.retry_delay_ms),
        }
    }

    /// Run `f` on a pooled connection inside `spawn_blocking`.
    async fn run<T, F>(&self, attempts: Attempts, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: Fn(&mut PgConnection) -> RepositoryResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let counters = self.counters.clone();

        task::spawn_blocking(move || {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let result = pool.get().map_err(RepositoryError::from).and_then(|mut conn| {
                    counters.total.fetch_add(1, Ordering::Relaxed);
                    f(&mut conn)
                });

                match result {
                    Ok(value) => return Ok(value),
                    Err(e) => match attempts.allows_retry(attempt).filter(|_| e.is_retryable()) {
                        Some(delay) => {
                            debug!("Attempt {} failed, retrying in {:?}: {}", attempt, delay, e);
                            counters.retried.fetch_add(1, Ordering::Relaxed);
                            std::thread::sleep(delay);
                        }
                        None => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            return Err(e);
                        }
                    },
                }
            }
        })
        .await
        .map_err(|e| {
            RepositoryError::internal(format!("Task join error: {}", e))
                .in_operation("spawn_blocking")
        })?
    }
}

fn db_error(operation: &'static str) -> impl Fn(diesel::result::Error) -> RepositoryError {
    move |e| RepositoryError::from(e).in_operation(operation)
}

fn load_block_visit(conn: &mut PgConnection, block_visit_id: i64) -> RepositoryResult<BlockVisit> {
    let (row, night, observation_time): (BlockVisitRow, NaiveDate, i64) = block_visits::table
        .inner_join(night_infos::table)
        .inner_join(blocks::table)
        .filter(block_visits::block_visit_id.eq(block_visit_id))
        .select((
            BlockVisitRow::as_select(),
            night_infos::night_date,
            blocks::observation_time_sec,
        ))
        .first(conn)
        .optional()
        .map_err(db_error("read_block_visit"))?
        .ok_or_else(|| {
            RepositoryError::not_found(Entity::BlockVisit, block_visit_id, "read_block_visit")
        })?;
    row.into_block_visit(night, observation_time)
}

/// The `(semester, code)` of the block a visit was made for.
fn visit_block_key(
    conn: &mut PgConnection,
    block_visit_id: i64,
) -> RepositoryResult<(String, String)> {
    block_visits::table
        .inner_join(blocks::table)
        .filter(block_visits::block_visit_id.eq(block_visit_id))
        .select((blocks::semester, blocks::block_code))
        .first(conn)
        .optional()
        .map_err(db_error("resolve_authoritative_block"))?
        .ok_or_else(|| {
            RepositoryError::not_found(
                Entity::BlockVisit,
                block_visit_id,
                "resolve_authoritative_block",
            )
        })
}

/// [`VisitLedger`] over a connection with an open transaction.
struct PgLedger<'a> {
    conn: &'a mut PgConnection,
}

impl VisitLedger for PgLedger<'_> {
    fn read_block_visit(&mut self, block_visit_id: BlockVisitId) -> RepositoryResult<BlockVisit> {
        // Lock the visit first so a concurrent delete waits for this change.
        let id = block_visit_id.value();
        block_visits::table
            .find(id)
            .select(block_visits::block_visit_id)
            .for_update()
            .first::<i64>(self.conn)
            .optional()
            .map_err(db_error("read_block_visit"))?
            .ok_or_else(|| RepositoryError::not_found(Entity::BlockVisit, id, "read_block_visit"))?;
        load_block_visit(self.conn, id)
    }

    fn read_night_info(&mut self, night_info_id: NightInfoId) -> RepositoryResult<NightTimeTotals> {
        let id = night_info_id.value();
        let row = night_infos::table
            .find(id)
            .select(NightInfoRow::as_select())
            .for_update()
            .first::<NightInfoRow>(self.conn)
            .optional()
            .map_err(db_error("read_night_info"))?
            .ok_or_else(|| RepositoryError::not_found(Entity::NightInfo, id, "read_night_info"))?;
        Ok(NightInfo::from(row).totals())
    }

    fn resolve_authoritative_block(
        &mut self,
        block_visit_id: BlockVisitId,
    ) -> RepositoryResult<BlockCounters> {
        let (semester, code) = visit_block_key(self.conn, block_visit_id.value())?;

        // Resubmissions keep semester and code, so the newest row wins.
        let row = blocks::table
            .filter(blocks::semester.eq(&semester))
            .filter(blocks::block_code.eq(&code))
            .order(blocks::block_id.desc())
            .select(BlockRow::as_select())
            .for_update()
            .first::<BlockRow>(self.conn)
            .optional()
            .map_err(db_error("resolve_authoritative_block"))?
            .ok_or_else(|| {
                RepositoryError::not_found(
                    Entity::BlockVisit,
                    block_visit_id.value(),
                    "resolve_authoritative_block",
                )
                .with_details(format!("semester={}, code={}", semester, code))
            })?;

        Ok(row.into_block()?.counters())
    }

    fn lookup_observation_time(&mut self, block_visit_id: BlockVisitId) -> RepositoryResult<i64> {
        let id = block_visit_id.value();
        block_visits::table
            .inner_join(blocks::table)
            .filter(block_visits::block_visit_id.eq(id))
            .select(blocks::observation_time_sec)
            .first::<i64>(self.conn)
            .optional()
            .map_err(db_error("lookup_observation_time"))?
            .ok_or_else(|| {
                RepositoryError::not_found(Entity::BlockVisit, id, "lookup_observation_time")
            })
    }

    fn write_night_info(
        &mut self,
        night_info_id: NightInfoId,
        totals: &NightTimeTotals,
    ) -> RepositoryResult<()> {
        let id = night_info_id.value();
        let updated = diesel::update(night_infos::table.find(id))
            .set(NightTimeChangeset::from(totals))
            .execute(self.conn)
            .map_err(db_error("write_night_info"))?;
        if updated == 0 {
            return Err(RepositoryError::not_found(Entity::NightInfo, id, "write_night_info"));
        }
        Ok(())
    }

    fn write_block_counters(&mut self, counters: &BlockCounters) -> RepositoryResult<()> {
        let id = counters.block_id.value();
        let updated = diesel::update(blocks::table.find(id))
            .set(BlockCountersChangeset::from(counters))
            .execute(self.conn)
            .map_err(db_error("write_block_counters"))?;
        if updated == 0 {
            return Err(RepositoryError::not_found(Entity::Block, id, "write_block_counters"));
        }
        Ok(())
    }

    fn write_block_visit_status(
        &mut self,
        block_visit_id: BlockVisitId,
        state: &VisitState,
    ) -> RepositoryResult<BlockVisit> {
        let id = block_visit_id.value();
        let updated = diesel::update(
            block_visits::table
                .filter(block_visits::block_visit_id.eq(id))
                .filter(
                    block_visits::block_visit_status.ne(BlockVisitStatus::Deleted.stored_name()),
                ),
        )
        .set(BlockVisitStatusChangeset::from(state))
        .execute(self.conn)
        .map_err(db_error("write_block_visit_status"))?;

        if updated == 0 {
            return Err(
                RepositoryError::not_found(Entity::BlockVisit, id, "write_block_visit_status")
                    .with_details("missing or deleted at write time"),
            );
        }

        load_block_visit(self.conn, id)
    }
}

#[async_trait]
impl BlockVisitRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.run(self.read_attempts(), |conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(db_error("health_check"))
        })
        .await
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        let state = self.pool.state();
        Some(PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            max_size: self.config.max_pool_size,
            total_queries: self.counters.total.load(Ordering::Relaxed),
            failed_queries: self.counters.failed.load(Ordering::Relaxed),
            retried_operations: self.counters.retried.load(Ordering::Relaxed),
        })
    }

    async fn get_block_visit(&self, block_visit_id: BlockVisitId) -> RepositoryResult<BlockVisit> {
        let id = block_visit_id.value();
        self.run(self.read_attempts(), move |conn| load_block_visit(conn, id))
            .await
    }

    async fn get_block(&self, block_id: BlockId) -> RepositoryResult<Block> {
        let id = block_id.value();
        self.run(self.read_attempts(), move |conn| {
            blocks::table
                .find(id)
                .select(BlockRow::as_select())
                .first::<BlockRow>(conn)
                .optional()
                .map_err(db_error("get_block"))?
                .ok_or_else(|| RepositoryError::not_found(Entity::Block, id, "get_block"))?
                .into_block()
        })
        .await
    }

    async fn get_night_info(&self, night_info_id: NightInfoId) -> RepositoryResult<NightInfo> {
        let id = night_info_id.value();
        self.run(self.read_attempts(), move |conn| {
            night_infos::table
                .find(id)
                .select(NightInfoRow::as_select())
                .first::<NightInfoRow>(conn)
                .optional()
                .map_err(db_error("get_night_info"))?
                .map(NightInfo::from)
                .ok_or_else(|| RepositoryError::not_found(Entity::NightInfo, id, "get_night_info"))
        })
        .await
    }

    async fn update_block_visit_status(
        &self,
        request: &StatusChangeRequest,
    ) -> RepositoryResult<TransitionOutcome> {
        let request = request.clone();
        self.run(Attempts::Once, move |conn| {
            conn.transaction::<_, RepositoryError, _>(|tx| {
                apply_status_change(&mut PgLedger { conn: tx }, &request)
            })
        })
        .await
    }
}
