use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure kinds of every market query and loan operation.
///
/// Validation kinds are raised before any network access. `BatchRead` wraps a
/// transport failure unchanged; nothing in this crate retries it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LendError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Range {range} is out of bounds [{min}, {max}]")]
    RangeOutOfBounds { range: u32, min: u32, max: u32 },
    #[error("Domain error: {0}")]
    Domain(String),
    #[error("Batch read failed: {0}")]
    BatchRead(String),
    #[error("Approve required: {token} allowance {allowance} < {required}")]
    ApproveRequired {
        token: String,
        required: String,
        allowance: String,
    },
}

impl LendError {
    pub fn domain(msg: impl Into<String>) -> Self {
        LendError::Domain(msg.into())
    }

    pub fn batch_read(msg: impl Into<String>) -> Self {
        LendError::BatchRead(msg.into())
    }
}

impl From<crate::datasource::TransportError> for LendError {
    fn from(err: crate::datasource::TransportError) -> Self {
        LendError::BatchRead(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<LendError> for AppError {
    fn from(err: LendError) -> Self {
        match err {
            LendError::InvalidNumber(_)
            | LendError::RangeOutOfBounds { .. }
            | LendError::Domain(_)
            | LendError::ApproveRequired { .. } => AppError::BadRequest(err.to_string()),
            LendError::BatchRead(_) => AppError::Upstream(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
