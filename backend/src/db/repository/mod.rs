//! Repository trait definitions for database operations.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository operations
//! - [`block_visit`]: Async repository trait used by services and the HTTP layer
//! - [`ledger`]: Transaction-scoped row access used by status transitions

pub mod block_visit;
pub mod error;
pub mod ledger;

pub use block_visit::{BlockVisitRepository, PoolStats};
pub use error::{Entity, ErrorContext, RepositoryError, RepositoryResult};
pub use ledger::VisitLedger;
