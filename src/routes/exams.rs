//! Exam endpoints. These are thin wrappers that forward to the evaluation adapter.
//! Oracle-backed handlers always answer 200; only submit can fail, on persistence.

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{ExamRecord, FinalReport, ModuleContent, WritingGrade};
use crate::error::AppError;
use crate::oracle::Outcome;
use crate::policy::module_key;
use crate::protocol::{ChatIn, ChatOut, GenerateIn, GradeWritingIn, ReportIn, SubmitIn, SubmitOut, DEFAULT_LEVEL};
use crate::state::AppState;

fn log_fallback<T>(endpoint: &'static str, outcome: &Outcome<T>) {
    if let Some(reason) = outcome.reason() {
        warn!(target: "exam", %endpoint, %reason, "Served fallback payload");
    }
}

#[instrument(level = "info", skip(state, body), fields(module = %body.module, level = %body.level))]
pub async fn generate(State(state): State<Arc<AppState>>, Json(body): Json<GenerateIn>) -> Json<ModuleContent> {
    let outcome = state.evaluator.generate_content(&body.module, &body.level).await;
    log_fallback("generate", &outcome);
    Json(outcome.into_value())
}

#[instrument(level = "info", skip(state, body), fields(level = %body.level, content_len = body.content.len()))]
pub async fn grade_writing(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GradeWritingIn>,
) -> Json<WritingGrade> {
    let outcome = state.evaluator.grade_writing(&body.content, &body.level, &body.prompt).await;
    log_fallback("grade_writing", &outcome);
    Json(outcome.into_value())
}

/// Score a submission and append it to `exam_results`. The record is written even when
/// the score is a fallback; `degraded` tells the client which one it got.
#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, module = %body.module))]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitIn>,
) -> Result<Json<SubmitOut>, AppError> {
    let repo = state.repo()?;
    let level = body.level.as_deref().unwrap_or(DEFAULT_LEVEL);

    let outcome = state.evaluator.evaluate_submission(&body.module, level, &body.content).await;
    log_fallback("submit", &outcome);
    let degraded = outcome.is_fallback();
    let results = outcome.into_value();

    let record = ExamRecord {
        user_id: body.user_id,
        module: module_key(&body.module),
        content: body.content,
        analysis: results.clone(),
        timestamp: Utc::now(),
    };
    let firebase_id = repo.append_exam_record(&record).await?;
    info!(target: "exam", %firebase_id, score = results.score, %degraded, "Submission stored");

    Ok(Json(SubmitOut { status: "success", firebase_id, results, degraded }))
}

#[instrument(level = "info", skip(state, body), fields(level = %body.level))]
pub async fn report(State(state): State<Arc<AppState>>, Json(body): Json<ReportIn>) -> Json<FinalReport> {
    let outcome = state.evaluator.final_report(&body.scores, &body.level).await;
    log_fallback("report", &outcome);
    Json(outcome.into_value())
}

#[instrument(level = "info", skip(state, body), fields(message_len = body.message.len()))]
pub async fn chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatIn>) -> Result<Json<ChatOut>, AppError> {
    body.validate()?;
    if body.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be blank".into()));
    }
    let outcome = state.evaluator.chat_reply(&body.message).await;
    log_fallback("chat", &outcome);
    Ok(Json(ChatOut { reply: outcome.into_value() }))
}
