//! Passcode endpoints. Thin wrappers over `crate::otp`.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::instrument;

use crate::error::AppError;
use crate::otp::{issue_passcode, verify_passcode};
use crate::protocol::{SendOtpIn, StatusOut, VerifyOtpIn};
use crate::state::AppState;

#[instrument(level = "info", skip(state, body))]
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendOtpIn>,
) -> Result<Json<StatusOut>, AppError> {
    issue_passcode(state.otp.as_ref(), state.notifier.as_ref(), &body.email).await?;
    Ok(Json(StatusOut::success("Code sent")))
}

#[instrument(level = "info", skip(state, body))]
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyOtpIn>,
) -> Result<Json<StatusOut>, AppError> {
    verify_passcode(state.otp.as_ref(), &body.email, &body.code).await?;
    Ok(Json(StatusOut::success("Code verified")))
}
