//! API error types with JSON responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mangashelf_store::StoreError;
use serde::Serialize;

/// API error that can be returned from handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Unauthorized (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    Internal(String),

    /// Store error.
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Get the error code string for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Store(e) => match e {
                StoreError::NotFound { .. } => "NOT_FOUND",
                StoreError::AlreadyPurchased => "ALREADY_PURCHASED",
                StoreError::AlreadyOwnsComic => "ALREADY_OWNS_COMIC",
                StoreError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
                StoreError::UsernameTaken(_) => "USERNAME_TAKEN",
                StoreError::AlreadyBanned(_) => "ALREADY_BANNED",
                StoreError::Unauthorized(_) => "ADMIN_REQUIRED",
                StoreError::NotEntitled(_) => "NOT_ENTITLED",
                StoreError::Banned { .. } => "BANNED",
                StoreError::InvalidAmount(_) => "INVALID_AMOUNT",
                StoreError::InvalidUsername(_) => "INVALID_USERNAME",
                StoreError::UsernameReserved(_) => "USERNAME_RESERVED",
                StoreError::AlreadyReserved(_) => "ALREADY_RESERVED",
                StoreError::InvalidRating(_) => "INVALID_RATING",
                StoreError::InvalidPrice(_) => "INVALID_PRICE",
                StoreError::Database(_)
                | StoreError::MigrationError(_)
                | StoreError::ConfigError(_)
                | StoreError::SerializationError(_)
                | StoreError::CorruptRow(_) => "STORAGE_ERROR",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(e) => match e {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::AlreadyPurchased
                | StoreError::AlreadyOwnsComic
                | StoreError::UsernameTaken(_)
                | StoreError::AlreadyBanned(_)
                | StoreError::UsernameReserved(_)
                | StoreError::AlreadyReserved(_) => StatusCode::CONFLICT,
                StoreError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
                StoreError::Unauthorized(_)
                | StoreError::NotEntitled(_)
                | StoreError::Banned { .. } => StatusCode::FORBIDDEN,
                StoreError::InvalidAmount(_)
                | StoreError::InvalidUsername(_)
                | StoreError::InvalidRating(_)
                | StoreError::InvalidPrice(_) => StatusCode::BAD_REQUEST,
                StoreError::Database(_)
                | StoreError::MigrationError(_)
                | StoreError::ConfigError(_)
                | StoreError::SerializationError(_)
                | StoreError::CorruptRow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetails,
}

/// Error details within the response.
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    /// Error code (e.g., "NOT_FOUND", "INSUFFICIENT_FUNDS").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            error: ErrorDetails {
                code: self.code().to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_status() {
        let cases = [
            (ApiError::from(StoreError::AlreadyPurchased), StatusCode::CONFLICT),
            (
                ApiError::from(StoreError::InsufficientFunds {
                    required: 30,
                    available: 10,
                }),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                ApiError::from(StoreError::Unauthorized("bob".to_string())),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(StoreError::Banned {
                    reason: "spam".to_string(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (ApiError::from(StoreError::InvalidAmount(0)), StatusCode::BAD_REQUEST),
            (
                ApiError::from(StoreError::not_found("comic", "x")),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error}");
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::from(StoreError::AlreadyOwnsComic).code(),
            "ALREADY_OWNS_COMIC"
        );
        assert_eq!(
            ApiError::from(StoreError::MigrationError("boom".to_string())).code(),
            "STORAGE_ERROR"
        );
        assert_eq!(ApiError::BadRequest("x".to_string()).code(), "BAD_REQUEST");
    }
}
