//! Errors of the accounting engine and its storage backends.
//!
//! Callers are expected to branch on two variants only:
//!
//! - [`RepositoryError::NotFound`]: unknown or deleted block visit, missing night/block
//! - [`RepositoryError::ValidationError`]: bad status/reason combination
//!
//! Every other variant is an integrity failure. By the time it reaches the
//! caller the surrounding transaction has been rolled back.

use std::fmt;

use crate::models::UnknownValue;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Kind of row an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    BlockVisit,
    Block,
    NightInfo,
}

impl Entity {
    fn label(self) -> &'static str {
        match self {
            Entity::BlockVisit => "Block visit",
            Entity::Block => "Block",
            Entity::NightInfo => "Night info",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::BlockVisit => "block_visit",
            Entity::Block => "block",
            Entity::NightInfo => "night_info",
        })
    }
}

/// Where an error happened, for logs and API error details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub operation: Option<&'static str>,
    pub entity: Option<Entity>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
    /// Set on transient failures (pool exhaustion, serialization conflicts).
    pub retryable: bool,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation: Some(operation),
            ..Default::default()
        }
    }

    /// Context pointing at one row.
    pub fn row(operation: &'static str, entity: Entity, id: i64) -> Self {
        Self {
            operation: Some(operation),
            entity: Some(entity),
            entity_id: Some(id),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Renders as ` [operation=.., entity=.., ...]`, or nothing when empty.
impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::with_capacity(5);
        if let Some(op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(details) = &self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable".to_string());
        }
        write!(f, " [{}]", parts.join(", "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {message}{context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{context}")]
    ValidationError {
        message: String,
        context: ErrorContext,
    },

    /// Pool or connection failure.
    #[error("Connection error: {message}{context}")]
    ConnectionError {
        message: String,
        context: ErrorContext,
    },

    #[error("Query error: {message}{context}")]
    QueryError {
        message: String,
        context: ErrorContext,
    },

    /// A write inside a status change failed, or the commit did.
    #[error("Transaction error: {message}{context}")]
    TransactionError {
        message: String,
        context: ErrorContext,
    },

    /// Corrupt stored values and broken preconditions.
    #[error("Internal error: {message}{context}")]
    InternalError {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{context}")]
    ConfigurationError {
        message: String,
        context: ErrorContext,
    },
}

impl RepositoryError {
    /// `"<Entity> <id> not found"`, pointing at the missing row.
    pub fn not_found(entity: Entity, id: i64, operation: &'static str) -> Self {
        Self::NotFound {
            message: format!("{} {} not found", entity.label(), id),
            context: ErrorContext::row(operation, entity, id),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Connection failures are always retryable.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            context: ErrorContext::default(),
        }
        .retryable()
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// A stored status or reason that matches no serialization table entry.
    pub fn corrupt_value(err: UnknownValue, entity: Entity, id: i64) -> Self {
        Self::InternalError {
            message: err.to_string(),
            context: ErrorContext::row("decode_row", entity, id),
        }
    }

    pub fn in_operation(mut self, operation: &'static str) -> Self {
        self.context_mut().operation = Some(operation);
        self
    }

    pub fn for_row(mut self, entity: Entity, id: i64) -> Self {
        let context = self.context_mut();
        context.entity = Some(entity);
        context.entity_id = Some(id);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.context_mut().details = Some(details.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.context_mut().retryable = true;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError { .. })
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::NotFound { context, .. }
            | Self::ValidationError { context, .. }
            | Self::ConnectionError { context, .. }
            | Self::QueryError { context, .. }
            | Self::TransactionError { context, .. }
            | Self::InternalError { context, .. }
            | Self::ConfigurationError { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::NotFound { context, .. }
            | Self::ValidationError { context, .. }
            | Self::ConnectionError { context, .. }
            | Self::QueryError { context, .. }
            | Self::TransactionError { context, .. }
            | Self::InternalError { context, .. }
            | Self::ConfigurationError { context, .. } => context,
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::NotFound => RepositoryError::NotFound {
                message: "Record not found".to_string(),
                context: ErrorContext::default(),
            },
            // Two status changes on one night can conflict; resubmitting is safe.
            Error::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
                RepositoryError::transaction(info.message()).retryable()
            }
            Error::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                RepositoryError::internal(info.message())
                    .with_details(info.constraint_name().unwrap_or("check").to_string())
            }
            Error::DatabaseError(kind, info) => RepositoryError::query(info.message())
                .with_details(format!("db_error_kind={:?}", kind)),
            Error::RollbackTransaction => RepositoryError::transaction("Transaction rolled back"),
            Error::DeserializationError(e) | Error::SerializationError(e) => {
                RepositoryError::internal(e.to_string())
            }
            other => RepositoryError::query(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::r2d2::PoolError> for RepositoryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RepositoryError::connection(err.to_string()).in_operation("get_connection")
    }
}
