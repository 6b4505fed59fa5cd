/// Error types for the ranking service
///
/// Every fallible operation in the crate returns `crate::error::Result`.
/// Errors that reach an HTTP handler are converted into JSON responses.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

/// Result type for ranking-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Ranking persistence (scores, stats, view) failed
    #[error("Database error: {0}")]
    Database(String),

    /// Signal source or item store could not be read
    #[error("Source error: {0}")]
    Source(String),

    /// Service configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request parameters failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No kind in scope could be served
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Normalization pass aborted; the statistic basis may be partial
    #[error("Normalization failed: {0}")]
    Normalization(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    status: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_)
            | AppError::Source(_)
            | AppError::Config(_)
            | AppError::Normalization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Unavailable(_) => "unavailable_error",
            _ => "server_error",
        };

        HttpResponse::build(status).json(ErrorBody {
            error,
            message: self.to_string(),
            status: status.as_u16(),
        })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<envy::Error> for AppError {
    fn from(err: envy::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
