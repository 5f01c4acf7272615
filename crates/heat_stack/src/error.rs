//! Error types for stack reconciliation and inspection.

use heat_api::ApiError;
use thiserror::Error;

/// Result type alias for stack operations.
pub type StackResult<T> = Result<T, StackError>;

/// Errors surfaced to the caller-facing layer.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Orchestration endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflicting lifecycle operation: {0}")]
    Conflict(String),

    #[error("Timed out after {seconds} seconds waiting for stack {stack}")]
    Timeout { stack: String, seconds: u64 },

    #[error("Stack reached {status}: {status_reason}")]
    ReconciliationFailed { status: String, status_reason: String },

    #[error("Not found: {0}")]
    LookupNotFound(String),

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Cancelled while waiting for stack {0}")]
    Cancelled(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Orchestration API error: {0}")]
    Api(ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StackError {
    pub fn failed(status: impl ToString, reason: impl Into<String>) -> Self {
        StackError::ReconciliationFailed {
            status: status.to_string(),
            status_reason: reason.into(),
        }
    }

    /// Worth another poll before the deadline.
    pub fn is_retryable_during_poll(&self) -> bool {
        matches!(
            self,
            StackError::TransientNetwork(_) | StackError::LookupNotFound(_)
        )
    }
}

impl From<ApiError> for StackError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Authentication(msg) => StackError::Authentication(msg),
            ApiError::EndpointNotFound(msg) => StackError::EndpointNotFound(msg),
            ApiError::Conflict(msg) => StackError::Conflict(msg),
            ApiError::NotFound(msg) => StackError::LookupNotFound(msg),
            ApiError::Transient(msg) => StackError::TransientNetwork(msg),
            ApiError::Config(msg) => StackError::Validation(msg),
            other => StackError::Api(other),
        }
    }
}
