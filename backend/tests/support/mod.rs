//! Environment fixture for tests that select a repository from process
//! variables.

use parking_lot::{const_mutex, Mutex, MutexGuard};

static ENV: Mutex<()> = const_mutex(());

/// Variables read by `RepositoryConfig::from_env`.
const REPOSITORY_VARS: &[&str] = &[
    "REPOSITORY_CONFIG",
    "REPOSITORY_TYPE",
    "DATABASE_URL",
    "PG_DATABASE_URL",
    "PG_POOL_MAX",
    "PG_POOL_MIN",
    "PG_CONN_TIMEOUT_SEC",
    "PG_IDLE_TIMEOUT_SEC",
    "PG_MAX_RETRIES",
    "PG_RETRY_DELAY_MS",
];

/// Holds the environment for one test: every repository variable starts
/// unset, and all of them get their previous values back on drop, panics
/// included. Tests holding one run one at a time.
pub struct RepositoryEnv {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl RepositoryEnv {
    pub fn clean() -> Self {
        let lock = ENV.lock();
        let saved = REPOSITORY_VARS
            .iter()
            .map(|&key| (key, std::env::var(key).ok()))
            .collect();
        for key in REPOSITORY_VARS {
            std::env::remove_var(key);
        }
        Self { saved, _lock: lock }
    }

    pub fn set(self, key: &'static str, value: &str) -> Self {
        assert!(
            REPOSITORY_VARS.contains(&key),
            "{} is not a repository variable",
            key
        );
        std::env::set_var(key, value);
        self
    }
}

impl Drop for RepositoryEnv {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}
