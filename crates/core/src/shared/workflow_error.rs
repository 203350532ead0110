use thiserror::Error;

use crate::service::domain::face_service::ServiceError;

/// Failure of a registry, enrollment, recognition or training operation.
///
/// Every variant is returned to the caller; nothing is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded with {status}: {body}")]
    Server { status: u16, body: String },
    #[error("unexpected response from server: {0}")]
    InvalidResponse(String),
    #[error("a request for {0} is already in flight")]
    AlreadyInFlight(String),
    #[error("{0} is already trained")]
    AlreadyTrained(String),
    #[error("request cancelled")]
    Cancelled,
}

impl From<ServiceError> for WorkflowError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Network(msg) => WorkflowError::Network(msg),
            ServiceError::Server { status, body } => WorkflowError::Server { status, body },
            ServiceError::InvalidResponse(msg) => WorkflowError::InvalidResponse(msg),
        }
    }
}
