//! Database module for block visit accounting.
//!
//! This module provides abstractions for database operations via the Repository pattern,
//! allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (REST API, server binary)            │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Trait (repository/) - Abstract Interface    │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────┐
//!     │                              │
//! ┌───▼──────────────┐   ┌───────────▼──────────┐
//! │ Postgres (Diesel)│   │ Local (in-memory)    │
//! └──────────────────┘   └──────────────────────┘
//! ```
//!
//! # Recommended Usage
//!
//! ```no_run
//! use observation_accounting::db::{services, RepositoryFactory};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::from_env()?;
//!     let visit = services::update_block_visit_status(
//!         repo.as_ref(),
//!         42.into(),
//!         "Rejected",
//!         Some("Observing conditions not met"),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! The backend is chosen at runtime from `REPOSITORY_CONFIG` or the
//! environment (see [`repo_config`]); features only decide which backends
//! are compiled in.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;

pub use services::{
    get_block, get_block_visit, get_night_info, health_check, update_block_visit_status,
};

pub use factory::RepositoryFactory;
pub use repo_config::{PostgresConfig, RepositoryConfig, RepositoryType};
pub use repositories::{LocalRepository, NewBlock, WriteFault};
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    BlockVisitRepository, Entity, ErrorContext, PoolStats, RepositoryError, RepositoryResult,
    VisitLedger,
};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn BlockVisitRepository>> = OnceLock::new();

/// Initialize the global repository singleton from the environment.
///
/// Blocks while a Postgres pool connects and migrates.
pub fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let repo = RepositoryFactory::from_env().context("Failed to initialize repository")?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Get a reference to the global repository instance, initializing it on first use.
pub fn get_repository() -> Result<&'static Arc<dyn BlockVisitRepository>> {
    if REPOSITORY.get().is_none() {
        init_repository()?;
    }

    REPOSITORY
        .get()
        .context("Database not initialized. Call init_repository() first.")
}
