//! Request-level error type and its mapping to HTTP responses.
//!
//! Oracle failures never show up here: they are absorbed by the evaluation
//! adapter and turned into fallback payloads.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::otp::OtpError;
use crate::store::StoreError;

/// Fixed message for any failed passcode verification.
pub const INVALID_PASSCODE_MESSAGE: &str = "Invalid or expired code";

#[derive(Debug, Error)]
pub enum AppError {
    /// A required dependency (document store) was never initialized. 503.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Passcode missing or wrong. 400 with an uninformative message.
    #[error("invalid passcode")]
    InvalidPasscode,

    /// 400
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Document store rejected a write. 500 carrying the store message.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// 500 with a generic body; the detail is only logged.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unavailable(msg) => {
                tracing::error!(target: "certsim_backend", %msg, "Dependency unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::InvalidPasscode => (StatusCode::BAD_REQUEST, INVALID_PASSCODE_MESSAGE.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Persistence(msg) => {
                tracing::error!(target: "store", %msg, "Persistence failure");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Internal(msg) => {
                tracing::error!(target: "certsim_backend", %msg, "Internal Server Error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passcode_failure_is_a_client_error_with_fixed_text() {
        let res = AppError::InvalidPasscode.into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unavailable_store_is_a_server_error() {
        let res = AppError::Unavailable("document store not configured".into()).into_response();
        assert!(res.status().is_server_error());
    }

    #[test]
    fn store_errors_become_persistence_errors() {
        let err: AppError = StoreError::Backend("quota exceeded".into()).into();
        assert!(matches!(err, AppError::Persistence(ref m) if m.contains("quota exceeded")));
    }
}
