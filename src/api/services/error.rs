//! Service-level error type.

use thiserror::Error;

use crate::models::ValidationErrors;
use crate::storage::StorageError;

/// Outcome of a failed service operation.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request was understood but failed validation
    #[error("validation failed")]
    Validation(ValidationErrors),
    /// The addressed flow does not exist
    #[error("flow not found")]
    NotFound,
    /// The storage backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(errors)
    }
}
