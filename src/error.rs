/// Unified error types for the microblog service
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or invalid caller identity
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Bad content length/format or malformed request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Per-author submission quota exhausted
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Duration },

    /// A post references an author the identity provider does not know
    #[error("Author for post not found: {0}")]
    AuthorNotFound(String),

    /// The author exists but carries no usable display name
    #[error("Author identity incomplete: {0}")]
    AuthorIdentityIncomplete(String),

    /// An external collaborator did not answer in time
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// An external collaborator failed or was unreachable
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether a caller may reasonably retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. }
                | AppError::UpstreamTimeout(_)
                | AppError::UpstreamUnavailable(_)
        )
    }
}

/// RPC error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            AppError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };

        let (status, error_code, message) = match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string()),
            AppError::Authentication(_) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "TOO_MANY_REQUESTS",
                self.to_string(),
            ),
            AppError::AuthorNotFound(_) | AppError::AuthorIdentityIncomplete(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                self.to_string(),
            ),
            AppError::UpstreamTimeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "UPSTREAM_TIMEOUT",
                self.to_string(),
            ),
            AppError::UpstreamUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UPSTREAM_UNAVAILABLE",
                self.to_string(),
            ),
            AppError::Database(_) | AppError::Internal(_) | AppError::Io(_) | AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(RpcErrorResponse {
            error: error_code.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        if let Some(retry_after) = retry_after {
            // Round up so a client never retries inside the window
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
