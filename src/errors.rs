use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Errors surfaced by the status API.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

/// Startup configuration errors. The only condition that stops the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: String, value: String },
}

/// Why a single target's telemetry could not be fetched.
///
/// All variants are non-fatal: the target is skipped for the current cycle
/// and tried again on the next one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Unreachable host, timeout, or non-success HTTP status.
    #[error("Network error: {0}")]
    Network(String),

    /// Success status but the body lacks an expected field.
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// Coordinates that are non-finite or out of range.
    #[error("Invalid target: {0}")]
    TargetInvalid(String),
}

impl FetchError {
    /// Short machine-friendly label, used in the status report.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::ResponseShape(_) => "response_shape",
            FetchError::TargetInvalid(_) => "target_invalid",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::ResponseShape(format!("body is not valid JSON: {}", err))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
