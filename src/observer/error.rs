use thiserror::Error;

use crate::database::manager::DatabaseError;

/// Observer system errors with structured error types
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Invalid value for '{field}': {message}")]
    ValidationError { field: String, message: String },

    #[error("Missing required fields: {}", .0.join(", "))]
    RequiredFields(Vec<String>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Observer timed out: {0}")]
    Timeout(String),
}

impl ObserverError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ObserverError::ValidationError { field: field.into(), message: message.into() }
    }
}

/// Non-fatal problem raised after the record was written
#[derive(Debug, Clone)]
pub struct ObserverWarning {
    pub observer: &'static str,
    pub message: String,
}
