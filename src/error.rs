/// Unified error types for Tasklane
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
///
/// Every service and gate operation classifies its failures into one of
/// these kinds at the point of detection. Raw database faults travel as
/// `Database` and always surface as an internal server error.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed input or failed validation
    #[error("{0}")]
    BadRequest(String),

    /// Missing, invalid or mismatched credential
    #[error("{0}")]
    Unauthorized(String),

    /// Expired credential
    #[error("{0}")]
    Forbidden(String),

    /// Account, session or task absent
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation (e.g. duplicate email)
    #[error("{0}")]
    Conflict(String),

    /// Unexpected fault
    #[error("{0}")]
    Internal(String),

    /// Invalid startup configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    /// HTTP status this error kind maps to
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Config(_) | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Reclassify a fault raised by an insert or update.
    ///
    /// Unique violations become `Conflict`, foreign key violations become
    /// `NotFound` with the given subject; everything else stays a database
    /// fault.
    pub fn from_write_error(err: sqlx::Error, subject: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return ApiError::Conflict(format!("duplicate key violation: {}", db_err.message()));
            }
            if db_err.is_foreign_key_violation() {
                return ApiError::NotFound(format!("{} not found", subject));
            }
        }
        ApiError::Database(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(errors.to_string())
    }
}

/// Error envelope returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            ApiError::Internal(_) | ApiError::Config(_) | ApiError::Database(_) => {
                tracing::error!(error = %self, "request failed with internal error");
                "internal server error".to_string() // Don't leak details
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            status: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type ApiResult<T> = Result<T, ApiError>;
