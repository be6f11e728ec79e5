//! The seam between the evaluation adapter and whatever language model scores things.
//!
//! `Oracle` is one request/response call. `Outcome` makes the fail-soft contract
//! explicit: callers always get a value, and can see whether it came from the model.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
  #[error("oracle disabled (no API key configured)")]
  Disabled,
  #[error("oracle transport error: {0}")]
  Transport(String),
  #[error("oracle HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("oracle response parse error: {0}")]
  Parse(String),
}

/// Which model class a request should run on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelTier {
  Fast,
  Strong,
}

/// Expected response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
  Text,
  JsonObject,
}

#[derive(Clone, Debug)]
pub struct OracleRequest {
  pub tier: ModelTier,
  pub system: String,
  pub user: String,
  pub temperature: f32,
  pub format: ResponseFormat,
  pub max_tokens: Option<u32>,
}

impl OracleRequest {
  pub fn json(tier: ModelTier, system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
    Self {
      tier,
      system: system.into(),
      user: user.into(),
      temperature,
      format: ResponseFormat::JsonObject,
      max_tokens: None,
    }
  }

  pub fn text(tier: ModelTier, system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
    Self { format: ResponseFormat::Text, ..Self::json(tier, system, user, temperature) }
  }

  pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
    self.max_tokens = Some(max_tokens);
    self
  }
}

#[async_trait]
pub trait Oracle: Send + Sync {
  /// Single attempt; returns the raw message content.
  async fn complete(&self, request: OracleRequest) -> Result<String, OracleError>;

  /// Short label for logs and the health endpoint.
  fn describe(&self) -> String;
}

/// Run a JSON-format request and deserialize the content into `T`.
pub async fn ask_json<T: DeserializeOwned>(oracle: &dyn Oracle, request: OracleRequest) -> Result<T, OracleError> {
  let text = oracle.complete(request).await?;
  parse_json_content(&text)
}

/// Models sometimes wrap JSON in a ```json fence even in JSON mode; strip it before parsing.
pub fn parse_json_content<T: DeserializeOwned>(text: &str) -> Result<T, OracleError> {
  let trimmed = text.trim();
  let body = trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
    .and_then(|rest| rest.trim_end().strip_suffix("```"))
    .unwrap_or(trimmed);
  serde_json::from_str::<T>(body.trim()).map_err(|e| OracleError::Parse(e.to_string()))
}

/// Either the oracle's answer or a canned substitute plus the reason it was needed.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
  Answered(T),
  Fallback { value: T, reason: String },
}

impl<T> Outcome<T> {
  pub fn fallback(value: T, reason: impl Into<String>) -> Self {
    Outcome::Fallback { value, reason: reason.into() }
  }

  pub fn is_fallback(&self) -> bool {
    matches!(self, Outcome::Fallback { .. })
  }

  pub fn value(&self) -> &T {
    match self {
      Outcome::Answered(v) | Outcome::Fallback { value: v, .. } => v,
    }
  }

  pub fn into_value(self) -> T {
    match self {
      Outcome::Answered(v) | Outcome::Fallback { value: v, .. } => v,
    }
  }

  pub fn reason(&self) -> Option<&str> {
    match self {
      Outcome::Answered(_) => None,
      Outcome::Fallback { reason, .. } => Some(reason),
    }
  }
}
