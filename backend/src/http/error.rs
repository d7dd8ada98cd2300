//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Malformed request body
    BadRequest(String),
    /// Repository error
    Repository(RepositoryError),
}

fn repository_response(err: RepositoryError) -> (StatusCode, ApiError) {
    let details = err.context().details.clone();
    let (status, code, message) = match err {
        RepositoryError::NotFound { message, .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
        RepositoryError::ValidationError { message, .. } => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "REPOSITORY_ERROR",
            other.to_string(),
        ),
    };

    let mut error = ApiError::new(code, message);
    if let Some(details) = details {
        error = error.with_details(details);
    }
    (status, error)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Repository(e) => repository_response(e),
        };

        (status, Json(error)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::Entity;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = RepositoryError::not_found(Entity::BlockVisit, 3, "read_block_visit");
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_400_with_details() {
        let err = RepositoryError::validation("A rejected block visit requires a rejection reason")
            .in_operation("update_block_visit_status")
            .with_details("status=Rejected");
        let (status, body) = repository_response(err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.details.as_deref(), Some("status=Rejected"));
    }

    #[test]
    fn test_transaction_error_maps_to_500() {
        let response =
            AppError::from(RepositoryError::transaction("commit failed")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
