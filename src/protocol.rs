//! Public HTTP request/response DTOs (serde ready).
//! Keep this small and stable so backend and frontend can evolve independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::domain::{EvaluationResult, ModuleScores};

/// Level used when a request does not name one.
pub const DEFAULT_LEVEL: &str = "B1";

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

#[derive(Debug, Serialize)]
pub struct RootOut {
    pub message: &'static str,
    pub docs: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub oracle: String,
    pub store: String,
}

#[derive(Debug, Serialize)]
pub struct StatusOut {
    pub status: &'static str,
    pub message: String,
}

impl StatusOut {
    pub fn success(message: impl Into<String>) -> Self {
        Self { status: "success", message: message.into() }
    }
}

//
// Auth
//

#[derive(Debug, Deserialize)]
pub struct SendOtpIn {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpIn {
    pub email: String,
    pub code: String,
}

//
// Users
//

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterIn {
    #[validate(length(min = 1, message = "uid must not be empty"))]
    pub uid: String,
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub full_name: String,
    #[validate(email(message = "email is not valid"))]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
}

//
// Exams
//

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    pub module: String,
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct GradeWritingIn {
    pub content: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitIn {
    pub user_id: String,
    pub module: String,
    #[serde(default)]
    pub level: Option<String>,
    /// Free-form: an essay string, an answer sheet object, a transcript...
    pub content: Value,
}

#[derive(Debug, Serialize)]
pub struct SubmitOut {
    pub status: &'static str,
    pub firebase_id: String,
    pub results: EvaluationResult,
    /// True when `results` is the canned record because the oracle failed.
    pub degraded: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReportIn {
    #[serde(flatten)]
    pub scores: ModuleScores,
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatIn {
    #[validate(length(min = 1, max = 2000, message = "message must be 1-2000 characters"))]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatOut {
    pub reply: String,
}
