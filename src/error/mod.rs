//! Unified error handling for Opsdesk Core

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
///
/// Every variant here is recoverable by the caller and surfaced verbatim to
/// the API layer with a stable kind; none is process-fatal. `NotFound` is
/// used both for "does not exist" and "exists but out of the caller's row
/// scope" so a response never confirms existence to an unauthorized party.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Account is deactivated")]
    AccountDisabled,

    #[error("Workspace is suspended")]
    TenantSuspended,

    #[error("Workspace is required")]
    TenantRequired,

    #[error("Workspace mismatch")]
    TenantMismatch,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Insufficient rank: {0}")]
    InsufficientRank(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Request already assigned")]
    AlreadyAssigned,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl AppError {
    /// Stable machine-readable kind, independent of the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::AccountDisabled => "account_disabled",
            AppError::TenantSuspended => "workspace_suspended",
            AppError::TenantRequired => "workspace_required",
            AppError::TenantMismatch => "workspace_mismatch",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::InsufficientRank(_) => "insufficient_rank",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::InvalidStatus(_) => "invalid_status",
            AppError::AlreadyAssigned => "already_assigned",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) => "database_error",
            AppError::Jwt(_) => "jwt_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message) = match &self {
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::AccountDisabled => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::TenantSuspended => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::TenantRequired => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::TenantMismatch => (StatusCode::FORBIDDEN, self.to_string()),
            // Constant-shape 403: the message never names the resource, so a
            // denied call looks identical whether the resource exists or not.
            AppError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::InsufficientRank(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::InvalidStatus(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::AlreadyAssigned => (StatusCode::CONFLICT, self.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: kind.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

// Conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
