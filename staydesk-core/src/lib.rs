pub mod validation;
pub mod identity;
pub mod hotel;
pub mod booking;
pub mod link;
pub mod guest;
pub mod wizard;
pub mod mail;
pub mod storage;
pub mod repository;
pub mod memory;

use uuid::Uuid;
pub use validation::FieldError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {}", validation::summarize(.0))]
    ValidationError(Vec<FieldError>),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Booking link has already been used")]
    LinkAlreadyUsed,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("SMTP is not configured for hotel {0}")]
    SmtpNotConfigured(Uuid),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub fn invalid(field: &str, message: &str) -> Self {
        CoreError::ValidationError(vec![FieldError::new(field, message)])
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
