//! Runtime configuration.
//!
//! Two layers, read once at startup:
//!   - `Settings`: process settings from environment variables (port, oracle, store, CORS).
//!   - `AgentConfig`: optional TOML at AGENT_CONFIG_PATH with prompt and module-policy overrides.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{error, info};

use crate::policy::ModulePolicy;

#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  pub cors_origins: Vec<String>,
  pub oracle: OracleSettings,
  pub store: StoreSettings,
}

#[derive(Clone, Debug)]
pub struct OracleSettings {
  pub api_key: Option<String>,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
  Memory,
  Firestore,
  Disabled,
}

#[derive(Clone, Debug)]
pub struct StoreSettings {
  pub backend: StoreBackend,
  pub firestore_project_id: Option<String>,
  pub firestore_access_token: Option<String>,
  pub firestore_emulator_host: Option<String>,
}

impl Settings {
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build settings from any key lookup; `from_env` passes the process environment.
  pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
    let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let port = non_empty("PORT").and_then(|p| p.parse::<u16>().ok()).unwrap_or(3000);
    let cors_origins = non_empty("CORS_ORIGINS")
      .map(|v| v.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
      .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]);

    let oracle = OracleSettings {
      api_key: non_empty("OPENAI_API_KEY"),
      base_url: non_empty("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into()),
      fast_model: non_empty("OPENAI_FAST_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
      strong_model: non_empty("OPENAI_STRONG_MODEL").unwrap_or_else(|| "gpt-4o".into()),
      timeout_secs: non_empty("OPENAI_TIMEOUT_SECS").and_then(|v| v.parse().ok()).unwrap_or(30),
    };

    let backend = match non_empty("STORE_BACKEND").map(|v| v.to_lowercase()).as_deref() {
      Some("firestore") => StoreBackend::Firestore,
      Some("none") | Some("disabled") => StoreBackend::Disabled,
      _ => StoreBackend::Memory,
    };
    let store = StoreSettings {
      backend,
      firestore_project_id: non_empty("FIRESTORE_PROJECT_ID"),
      firestore_access_token: non_empty("FIRESTORE_ACCESS_TOKEN"),
      firestore_emulator_host: non_empty("FIRESTORE_EMULATOR_HOST"),
    };

    Self { port, cors_origins, oracle, store }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  /// Keyed by module id; replaces or adds policies.
  #[serde(default)]
  pub modules: HashMap<String, ModulePolicy>,
}

/// Prompts and fallback texts used by the evaluation adapter.
/// Every field can be overridden in TOML; unspecified fields keep their defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Evaluation (system prompt comes from the module policy)
  pub evaluation_user_template: String,
  // Content generation
  pub generation_system: String,
  pub comprehension_user_template: String,
  pub composition_user_template: String,
  pub speaking_user_template: String,
  // Quick writing grade
  pub writing_grade_system: String,
  pub writing_grade_user_template: String,
  // Final report
  pub report_system: String,
  pub report_user_template: String,
  // Chat
  pub chat_system: String,
  // Fallback texts (localize here)
  pub evaluation_fallback_feedback: String,
  pub writing_fallback_feedback: String,
  pub chat_fallback_reply: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      evaluation_user_template: "Level: {level}\nContent to evaluate: {content}\n\nRespond in JSON with: score (number 0-{max_score}), feedback (string){extra_fields}.".into(),
      generation_system: "You are a Cambridge/IELTS exam content writer. Respond ONLY with strict JSON.".into(),
      comprehension_user_template: "Create a {module} exercise for CEFR level {level}. Return JSON with fields: title (string), passage (string, 150-250 words; for listening write it as an audio transcript), questions (array of 4 objects with question, options (array of 4 strings), correct_answer (one of the options)).".into(),
      composition_user_template: "Create a {module} task for CEFR level {level}. Return JSON with fields: title (string), passage (string: the task instructions the candidate must answer, 40-80 words).".into(),
      speaking_user_template: "Create a speaking exercise for CEFR level {level}. Return JSON with fields: target_sentence (one natural sentence to read aloud), prompt (a short question the candidate should answer orally).".into(),
      writing_grade_system: "You are a strict English writing examiner. Be concise. Output JSON only.".into(),
      writing_grade_user_template: "Level: {level}\nTask: {prompt}\nCandidate text: {content}\n\nReturn JSON: {\"score\": integer 0-100, \"feedback\": string under 60 words}.".into(),
      report_system: "You are an English certification coach. Output JSON only.".into(),
      report_user_template: "Target level: {level}\nScores (0-100): reading {reading}, writing {writing}, listening {listening}, speaking {speaking}.\nReturn JSON: {\"advice\": string (2-3 sentences), \"steps\": array of 3-5 short actionable steps, most important first}.".into(),
      chat_system: "You are a friendly English exam tutor. Answer in at most 3 short sentences.".into(),
      evaluation_fallback_feedback: "Sorry, we could not evaluate your answers right now. Your submission was saved; please try again later.".into(),
      writing_fallback_feedback: "Sorry, automatic grading is unavailable right now. Please try again in a few minutes.".into(),
      chat_fallback_reply: "Sorry, the tutor is unavailable right now. Try again in a moment.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "certsim_backend", %path, modules = cfg.modules.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "certsim_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "certsim_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}
