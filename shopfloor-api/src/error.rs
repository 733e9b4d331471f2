use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shopfloor_core::CoreError;
use shopfloor_shared::KeyParseError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    UnprocessableError(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnprocessableError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NotFound { .. } => AppError::NotFoundError(message),
            CoreError::ValidationError(_) => AppError::ValidationError(message),
            CoreError::AllocationConflict(_) => AppError::ConflictError(message),
            CoreError::NotEligible(_)
            | CoreError::InsufficientData(_)
            | CoreError::QuantityInvariantViolation { .. } => AppError::UnprocessableError(message),
            CoreError::StorageError(_) => AppError::InternalServerError(message),
        }
    }
}

impl From<KeyParseError> for AppError {
    fn from(err: KeyParseError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
