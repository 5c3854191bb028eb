use thiserror::Error;

use crate::status_code::StatusCode;

/// Main error type for address space operations
#[derive(Error, Debug)]
pub enum DiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Element is already locked by {0}")]
    AlreadyLocked(String),

    #[error("Element is not locked")]
    NotLocked,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Bad argument: {0}")]
    BadArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiError {
    /// Map the error to the OPC UA status code a server reports for it
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::BAD_NODE_ID_UNKNOWN,
            Self::AlreadyLocked(_) | Self::NotLocked => StatusCode::BAD_INVALID_STATE,
            Self::AccessDenied(_) => StatusCode::BAD_USER_ACCESS_DENIED,
            Self::NotImplemented(_) => StatusCode::BAD_NOT_IMPLEMENTED,
            Self::BadArgument(_) => StatusCode::BAD_INVALID_ARGUMENT,
            Self::InvalidState(_) => StatusCode::BAD_INVALID_STATE,
            Self::Timeout => StatusCode::BAD_TIMEOUT,
            Self::InvalidData(_) | Self::Json(_) => StatusCode::BAD_DECODING_ERROR,
            Self::Model(_) | Self::Io(_) => StatusCode::BAD_INTERNAL_ERROR,
        }
    }
}

/// Result type alias for address space operations
pub type DiResult<T> = Result<T, DiError>;
