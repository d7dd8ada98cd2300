//! Builds the repository a [`RepositoryConfig`] selects.

use log::info;
use std::sync::Arc;

use super::repo_config::{PostgresConfig, RepositoryConfig, RepositoryType};
use super::repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
use super::repositories::PostgresRepository;
use super::repository::{BlockVisitRepository, RepositoryError, RepositoryResult};

fn backend_disabled(repo_type: RepositoryType) -> RepositoryError {
    RepositoryError::configuration(format!(
        "This build does not include the {} repository (enable the {}-repo feature)",
        repo_type, repo_type
    ))
}

/// Repository factory for creating repository instances.
///
/// # Example
/// ```
/// use observation_accounting::db::{RepositoryConfig, RepositoryFactory};
///
/// let repo = RepositoryFactory::create(&RepositoryConfig::local()).unwrap();
/// ```
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Build the configured backend. Postgres connects and migrates here, so
    /// this blocks on the database.
    pub fn create(config: &RepositoryConfig) -> RepositoryResult<Arc<dyn BlockVisitRepository>> {
        let repo = match config.repository_type() {
            RepositoryType::Local => Self::create_local()?,
            RepositoryType::Postgres => Self::create_postgres(config.postgres_config()?)?,
        };
        info!("Using {} repository", config.repository_type());
        Ok(repo)
    }

    /// Build the backend described by [`RepositoryConfig::from_env`].
    pub fn from_env() -> RepositoryResult<Arc<dyn BlockVisitRepository>> {
        Self::create(&RepositoryConfig::from_env()?)
    }

    /// An empty in-memory repository.
    pub fn create_local() -> RepositoryResult<Arc<dyn BlockVisitRepository>> {
        if cfg!(feature = "local-repo") {
            Ok(Arc::new(LocalRepository::new()))
        } else {
            Err(backend_disabled(RepositoryType::Local))
        }
    }

    #[cfg(feature = "postgres-repo")]
    pub fn create_postgres(
        config: &PostgresConfig,
    ) -> RepositoryResult<Arc<dyn BlockVisitRepository>> {
        Ok(Arc::new(PostgresRepository::new(config.clone())?))
    }

    #[cfg(not(feature = "postgres-repo"))]
    pub fn create_postgres(
        _config: &PostgresConfig,
    ) -> RepositoryResult<Arc<dyn BlockVisitRepository>> {
        Err(backend_disabled(RepositoryType::Postgres))
    }
}
