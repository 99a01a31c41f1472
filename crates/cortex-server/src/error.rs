//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use cortex_core::error::CortexError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT", message)
    }

    /// A backing store or model provider could not be reached.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from cortex-core errors
impl From<CortexError> for ApiError {
    fn from(err: CortexError) -> Self {
        let error_code = err.code().as_str();
        let suggestion = err.suggestion().map(str::to_string);
        let transient = err.is_transient();

        let api = match err {
            CortexError::Validation { message, .. } => ApiError::validation(message),
            CortexError::NotFound { message, .. } => ApiError::not_found(message),
            CortexError::RateLimit { message, .. } => ApiError::rate_limit(message),
            CortexError::Configuration(msg) => ApiError::bad_request(msg),
            CortexError::UnsupportedProvider { provider } => {
                ApiError::bad_request(format!("Unsupported provider: {}", provider))
            }
            other if transient => ApiError::unavailable(other.to_string()),
            other => {
                tracing::error!(error = %other, "Request failed");
                ApiError::internal(other.to_string())
            }
        };

        let mut details = serde_json::json!({ "error_code": error_code });
        if let Some(suggestion) = suggestion {
            details["suggestion"] = serde_json::Value::String(suggestion);
        }
        api.with_details(details)
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
