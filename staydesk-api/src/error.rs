use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use staydesk_core::{CoreError, FieldError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(Vec<FieldError>),
    BadRequest(String),
    NotFoundError(String),
    ConflictError(String),
    Unprocessable(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFoundError(_) => StatusCode::NOT_FOUND,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InternalServerError(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::ValidationError(fields) => json!({
                "success": false,
                "error": "Validation failed",
                "fields": fields,
            }),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({ "success": false, "error": "Internal Server Error" })
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                json!({ "success": false, "error": "Internal Server Error" })
            }
            AppError::AuthenticationError(msg)
            | AppError::AuthorizationError(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFoundError(msg)
            | AppError::ConflictError(msg)
            | AppError::Unprocessable(msg) => json!({ "success": false, "error": msg }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(fields) => AppError::ValidationError(fields),
            CoreError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            CoreError::PermissionDenied(_) => AppError::AuthorizationError(err.to_string()),
            CoreError::InvalidTransition { .. }
            | CoreError::LinkAlreadyUsed
            | CoreError::Conflict(_) => AppError::ConflictError(err.to_string()),
            CoreError::SmtpNotConfigured(_) => AppError::Unprocessable(err.to_string()),
            CoreError::StorageError(_) | CoreError::InternalError(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
