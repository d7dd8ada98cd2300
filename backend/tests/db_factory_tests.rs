//! Repository selection from the environment and config files.

mod support;

use std::str::FromStr;

use observation_accounting::db::{
    RepositoryConfig, RepositoryError, RepositoryFactory, RepositoryType,
};
use support::RepositoryEnv;

fn config_file(content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repository.toml");
    std::fs::write(&path, content).unwrap();
    let path = path.to_str().unwrap().to_string();
    (dir, path)
}

#[test]
fn test_repository_type_from_str() {
    assert_eq!(
        RepositoryType::from_str("POSTGRES").unwrap(),
        RepositoryType::Postgres
    );
    assert_eq!(RepositoryType::from_str("pg").unwrap(), RepositoryType::Postgres);
    assert_eq!(RepositoryType::from_str("LOCAL").unwrap(), RepositoryType::Local);

    let err = RepositoryType::from_str("sqlite").unwrap_err();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
    assert!(err.to_string().contains("Unknown repository type: sqlite"));
}

#[test]
fn test_empty_environment_selects_local() {
    let _env = RepositoryEnv::clean();
    assert_eq!(RepositoryType::from_env().unwrap(), RepositoryType::Local);
    assert_eq!(RepositoryConfig::from_env().unwrap(), RepositoryConfig::local());
}

#[test]
fn test_database_url_selects_postgres() {
    let _env = RepositoryEnv::clean()
        .set("PG_DATABASE_URL", "postgres://localhost/observations")
        .set("PG_POOL_MAX", "4");

    assert_eq!(RepositoryType::from_env().unwrap(), RepositoryType::Postgres);
    let config = RepositoryConfig::from_env().unwrap();
    let pg = config.postgres_config().unwrap();
    assert_eq!(pg.database_url, "postgres://localhost/observations");
    assert_eq!(pg.max_pool_size, 4);
    assert_eq!(pg.min_pool_size, 1);
}

#[test]
fn test_explicit_repository_type_wins_over_database_url() {
    let _env = RepositoryEnv::clean()
        .set("REPOSITORY_TYPE", "local")
        .set("DATABASE_URL", "postgres://localhost/observations");

    assert_eq!(RepositoryType::from_env().unwrap(), RepositoryType::Local);
}

#[test]
fn test_invalid_repository_type_is_an_error() {
    let _env = RepositoryEnv::clean().set("REPOSITORY_TYPE", "invalid");

    assert!(RepositoryType::from_env().is_err());
    assert!(RepositoryFactory::from_env().is_err());
}

#[test]
fn test_unparseable_pool_size_is_an_error() {
    let _env = RepositoryEnv::clean()
        .set("DATABASE_URL", "postgres://localhost/observations")
        .set("PG_POOL_MAX", "many");

    let err = RepositoryConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("PG_POOL_MAX"));
}

#[test]
fn test_config_file_overrides_environment() {
    let (_dir, path) = config_file("[repository]\ntype = \"local\"\n");
    let _env = RepositoryEnv::clean()
        .set("REPOSITORY_CONFIG", &path)
        .set("DATABASE_URL", "postgres://localhost/observations");

    assert_eq!(RepositoryConfig::from_env().unwrap(), RepositoryConfig::local());
}

#[test]
fn test_config_file_with_unknown_type_is_rejected() {
    let (_dir, path) = config_file("[repository]\ntype = \"sqlite\"\n");
    let _env = RepositoryEnv::clean().set("REPOSITORY_CONFIG", &path);

    let err = RepositoryFactory::from_env().err().unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
}

#[test]
fn test_malformed_config_file_is_configuration_error() {
    let (_dir, path) = config_file("[repository\ntype = ");

    let err = RepositoryConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[tokio::test]
async fn test_create_local_via_factory() {
    let repo = RepositoryFactory::create(&RepositoryConfig::local()).unwrap();
    assert!(repo.health_check().await.unwrap());
}

#[cfg(not(feature = "postgres-repo"))]
#[test]
fn test_postgres_config_file_without_feature_fails() {
    let (_dir, path) = config_file(
        "[repository]\ntype = \"postgres\"\n[postgres]\ndatabase_url = \"postgres://db/obs\"\n",
    );
    let _env = RepositoryEnv::clean().set("REPOSITORY_CONFIG", &path);

    let err = RepositoryFactory::from_env().err().unwrap();
    assert!(err.to_string().contains("postgres-repo"));
}

#[test]
fn test_global_repository_is_initialized_once() {
    use observation_accounting::db;
    use std::sync::Arc;

    let _env = RepositoryEnv::clean();
    db::init_repository().unwrap();
    let first = db::get_repository().unwrap();
    let second = db::get_repository().unwrap();
    assert!(Arc::ptr_eq(first, second));
}
