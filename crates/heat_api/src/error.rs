//! Error types for the API layer.

use thiserror::Error;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can occur while talking to Keystone or Heat.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transient network error: {0}")]
    Transient(String),

    #[error("Remote error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Whether the failure is worth retrying on an idempotent read.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }

    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ApiError::Authentication(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            408 | 429 | 500..=599 => ApiError::Transient(format!("HTTP {}: {}", status, message)),
            _ => ApiError::Remote { status, message },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ApiError::Transient(err.to_string())
        } else {
            ApiError::Http(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(ApiError::from_status(401, "bad"), ApiError::Authentication(_)));
        assert!(matches!(ApiError::from_status(404, "gone"), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(409, "busy"), ApiError::Conflict(_)));
        assert!(ApiError::from_status(503, "down").is_transient());
        assert!(ApiError::from_status(429, "slow down").is_transient());
        assert!(matches!(
            ApiError::from_status(400, "bad template"),
            ApiError::Remote { status: 400, .. }
        ));
    }

    #[test]
    fn test_conflict_is_not_transient() {
        assert!(!ApiError::Conflict("stack busy".into()).is_transient());
    }
}
