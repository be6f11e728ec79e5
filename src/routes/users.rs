use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use tracing::{info, instrument};
use validator::Validate;

use crate::domain::UserProfile;
use crate::error::AppError;
use crate::normalize::{normalize_email, title_case_name};
use crate::protocol::{RegisterIn, StatusOut};
use crate::state::AppState;

/// Create or replace the profile stored under `uid`.
#[instrument(level = "info", skip(state, body), fields(uid = %body.uid))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterIn>,
) -> Result<Json<StatusOut>, AppError> {
    let mut body = body;
    body.uid = body.uid.trim().to_string();
    body.full_name = title_case_name(&body.full_name);
    body.email = normalize_email(&body.email);
    body.validate()?;

    let repo = state.repo()?;
    let profile = UserProfile {
        uid: body.uid,
        full_name: body.full_name,
        email: body.email,
        phone: trimmed(body.phone),
        birth_date: trimmed(body.birth_date),
        created_at: Utc::now(),
    };
    repo.upsert_profile(&profile).await?;
    info!(target: "certsim_backend", uid = %profile.uid, "Profile registered");
    Ok(Json(StatusOut::success("User registered successfully")))
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
