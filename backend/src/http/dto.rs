//! Data Transfer Objects for the HTTP API.
//!
//! Entities are returned as-is since they already derive Serialize; only
//! request bodies and the health response live here.

use serde::{Deserialize, Serialize};

use crate::db::PoolStats;

/// Request body for `PUT /v1/block-visits/{id}/status`.
///
/// Values are display names, e.g. `"Rejected"` and
/// `"Observing conditions not met"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
    /// Connection pool usage; absent for backends without a pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}
