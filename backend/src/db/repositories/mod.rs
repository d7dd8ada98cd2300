//! Repository implementations module.
//!
//! This module contains the implementations of the `BlockVisitRepository` trait:
//! - `postgres`: PostgreSQL implementation with Diesel ORM
//! - `local`: In-memory implementation for unit testing and local development
pub mod local;
#[cfg(feature = "postgres-repo")]
pub mod postgres;

pub use local::{LocalRepository, NewBlock, WriteFault};
#[cfg(feature = "postgres-repo")]
pub use postgres::PostgresRepository;
