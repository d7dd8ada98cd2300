//! # Observation Accounting Backend
//!
//! Keeps observing-night time accounting and block observation counters
//! consistent with the status of block visits.
//!
//! When an operator accepts or rejects a block visit (one attempt to observe a
//! block during a night), the night's science and lost time and the block's
//! accepted/rejected counters and lifecycle status are reconciled in the same
//! transaction as the status change itself.
//!
//! ## Architecture
//!
//! - [`models`]: Entities, typed IDs and the status/reason serialization tables
//! - [`services`]: Transition classification, reconciliation and orchestration
//! - [`db`]: Repository pattern with in-memory and Postgres backends
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod db;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
