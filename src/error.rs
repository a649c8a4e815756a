//! Error types for gitstore

use serde::Serialize;
use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum GitStoreError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Backend failure: {0}")]
    BackendFailure(String),

    #[error("{0}")]
    ValidationFailure(String),
}

/// The four error categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    BackendFailure,
    ValidationFailure,
}

impl GitStoreError {
    /// Classify this error into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            GitStoreError::Git(e) if e.code() == git2::ErrorCode::NotFound => ErrorKind::NotFound,
            GitStoreError::Git(_) => ErrorKind::BackendFailure,
            GitStoreError::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
                _ => ErrorKind::BackendFailure,
            },
            GitStoreError::Serialization(_) => ErrorKind::ValidationFailure,
            GitStoreError::NotFound(_) => ErrorKind::NotFound,
            GitStoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            GitStoreError::BackendFailure(_) => ErrorKind::BackendFailure,
            GitStoreError::ValidationFailure(_) => ErrorKind::ValidationFailure,
        }
    }

    /// Whether this error only means "absent", which callers usually recover from
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    fn code(&self) -> &'static str {
        match self {
            GitStoreError::Git(_) => "GIT_ERROR",
            GitStoreError::Io(_) => "IO_ERROR",
            GitStoreError::Serialization(_) => "SERIALIZATION_ERROR",
            GitStoreError::NotFound(_) => "NOT_FOUND",
            GitStoreError::PermissionDenied(_) => "PERMISSION_DENIED",
            GitStoreError::BackendFailure(_) => "BACKEND_FAILURE",
            GitStoreError::ValidationFailure(_) => "VALIDATION_FAILED",
        }
    }
}

/// Serializable error response for presentation layers
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<String>,
}

impl From<&GitStoreError> for ErrorResponse {
    fn from(error: &GitStoreError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            kind: error.kind(),
            message: error.to_string(),
            details: None,
        }
    }
}

impl From<GitStoreError> for ErrorResponse {
    fn from(error: GitStoreError) -> Self {
        ErrorResponse::from(&error)
    }
}

impl serde::Serialize for GitStoreError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ErrorResponse::from(self).serialize(serializer)
    }
}

/// Result type alias for gitstore operations
pub type Result<T> = std::result::Result<T, GitStoreError>;
