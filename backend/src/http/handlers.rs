//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the service
//! layer in [`crate::db::services`].

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};

use super::dto::{HealthResponse, UpdateStatusRequest};
use super::error::AppError;
use super::state::AppState;
use crate::db::services as db_services;
use crate::models::{Block, BlockId, BlockVisit, BlockVisitId, NightInfo, NightInfoId};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Path ids that are not integers get the JSON error body too.
fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    path.map(|Path(id)| id).map_err(|e| AppError::BadRequest(e.body_text()))
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and database is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
        pool: state.repository.pool_stats(),
    }))
}

// =============================================================================
// Block visits
// =============================================================================

/// GET /v1/block-visits/{block_visit_id}
pub async fn get_block_visit(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> HandlerResult<BlockVisit> {
    let block_visit_id = path_id(path)?;
    let visit =
        db_services::get_block_visit(state.repository.as_ref(), BlockVisitId::new(block_visit_id))
            .await?;
    Ok(Json(visit))
}

/// PUT /v1/block-visits/{block_visit_id}/status
///
/// Set the status of a block visit. Responds with the visit as persisted,
/// 404 for unknown or deleted visits and 400 for invalid status/reason pairs.
pub async fn update_block_visit_status(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> HandlerResult<BlockVisit> {
    let block_visit_id = path_id(path)?;
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let visit = db_services::update_block_visit_status(
        state.repository.as_ref(),
        BlockVisitId::new(block_visit_id),
        &request.status,
        request.rejection_reason.as_deref(),
    )
    .await?;

    Ok(Json(visit))
}

// =============================================================================
// Aggregates
// =============================================================================

/// GET /v1/blocks/{block_id}
pub async fn get_block(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> HandlerResult<Block> {
    let block_id = path_id(path)?;
    let block = db_services::get_block(state.repository.as_ref(), BlockId::new(block_id)).await?;
    Ok(Json(block))
}

/// GET /v1/night-info/{night_info_id}
pub async fn get_night_info(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> HandlerResult<NightInfo> {
    let night_info_id = path_id(path)?;
    let night =
        db_services::get_night_info(state.repository.as_ref(), NightInfoId::new(night_info_id))
            .await?;
    Ok(Json(night))
}
