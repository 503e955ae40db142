//! HTTP error responses with Sentry integration.
//!
//! Every failure leaves the server as JSON `{"error": ..., "code": ...}`.
//! Server-side failures are captured to Sentry before responding.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::TokenError;

/// Application-level error type for the pickup server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A token service rejected or failed the request.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Malformed request body or path.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No route matched.
    #[error("Not found")]
    NotFound,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Token(err) => match err {
                TokenError::Unauthorized => StatusCode::UNAUTHORIZED,
                TokenError::Forbidden => StatusCode::FORBIDDEN,
                TokenError::ShopNotFound(_) | TokenError::TokenNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                TokenError::ShopInactive(_) | TokenError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                TokenError::InvalidTransition { .. } => StatusCode::CONFLICT,
                TokenError::TokenCreationFailed => StatusCode::INTERNAL_SERVER_ERROR,
                TokenError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                TokenError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Token(err) => err.code(),
            Self::BadRequest(_) => "bad_request",
            Self::NotFound => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = ?self,
                code = self.code(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: message,
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
