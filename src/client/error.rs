use thiserror::Error;

/// Errors returned by the control plane client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("TLS setup error: {0}")]
    Tls(String),

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("Error for {operation}: Response: 404 {body}")]
    NotFound { operation: String, body: String },

    #[error("Error for {operation}: Response: 409 {body}")]
    Conflict { operation: String, body: String },

    #[error("Error for {operation}: Response: 400 {body}")]
    InvalidUpdate { operation: String, body: String },

    #[error("Error for {operation}: Response: {status} {body}")]
    Failed {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Error for {operation}: Got {count} objects in the response")]
    NotUnique { operation: String, count: usize },
}

/// Closed classification of a failed call
///
/// Call sites match on this instead of comparing raw status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOutcome {
    /// The object does not exist (or no longer exists)
    NotFound,
    /// Version mismatch, or the object is still referenced
    Conflict,
    /// The server rejected the update as invalid
    InvalidUpdate,
    /// Anything else, always fatal
    OtherFailure,
}

impl ApiError {
    /// Classify a non-success response
    pub fn from_status(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let operation = operation.into();
        let body = body.into();
        match status {
            404 => ApiError::NotFound { operation, body },
            409 => ApiError::Conflict { operation, body },
            400 => ApiError::InvalidUpdate { operation, body },
            _ => ApiError::Failed {
                operation,
                status,
                body,
            },
        }
    }

    pub fn outcome(&self) -> ApiOutcome {
        match self {
            ApiError::NotFound { .. } => ApiOutcome::NotFound,
            ApiError::Conflict { .. } => ApiOutcome::Conflict,
            ApiError::InvalidUpdate { .. } => ApiOutcome::InvalidUpdate,
            _ => ApiOutcome::OtherFailure,
        }
    }

    /// HTTP status of the response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::Conflict { .. } => Some(409),
            ApiError::InvalidUpdate { .. } => Some(400),
            ApiError::Failed { status, .. } => Some(*status),
            _ => None,
        }
    }
}
