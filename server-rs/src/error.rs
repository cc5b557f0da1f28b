use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use match_engine::{IdentityError, StoreError, WorkflowError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Validation(msg) => AppError::BadRequest(msg),
            WorkflowError::NotParticipant => AppError::BadRequest(e.to_string()),
            WorkflowError::DuplicateInvitation
            | WorkflowError::DuplicateRequest
            | WorkflowError::AlreadyParticipant
            | WorkflowError::MatchFull
            | WorkflowError::InvalidState(_)
            | WorkflowError::Conflict(_) => AppError::Conflict(e.to_string()),
            WorkflowError::NotFound(_) => AppError::NotFound(e.to_string()),
            WorkflowError::Forbidden(msg) => AppError::Forbidden(msg),
            WorkflowError::Store(inner) => AppError::Store(inner),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidCredentials | IdentityError::InvalidToken => {
                AppError::Unauthorized(e.to_string())
            }
            IdentityError::EmailTaken => AppError::Conflict(e.to_string()),
            IdentityError::Invalid(msg) => AppError::BadRequest(msg),
            IdentityError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::RateLimited { retry_after } = self {
            let body = json!({ "error": "Too many requests" });
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(body),
            )
                .into_response();
        }

        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Jwt(_) => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
