//! API error handling utilities.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::models::ValidationErrors;
use crate::services::ServiceError;
use crate::storage::StorageError;

/// API error response
#[derive(Debug)]
pub enum ApiError {
    /// 400 with the field-path error tree as the body
    Validation(ValidationErrors),
    /// 404 with an empty object
    NotFound,
    /// 500 with `{"error", "status"}`
    Storage(StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(errors.to_json())).into_response()
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
            ApiError::Storage(e) => {
                error!("Storage failure: {}", e);
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = json!({
                    "error": e.to_string(),
                    "status": status.as_u16(),
                });
                (status, Json(body)).into_response()
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(errors) => ApiError::Validation(errors),
            ServiceError::NotFound => ApiError::NotFound,
            ServiceError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        ApiError::Storage(error)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}
