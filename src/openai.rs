//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key or prompt bodies; submissions may contain personal data.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::OracleSettings;
use crate::oracle::{ModelTier, Oracle, OracleError, OracleRequest, ResponseFormat};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl OpenAI {
  /// Construct the client if an API key is configured; otherwise return None.
  pub fn from_settings(settings: &OracleSettings) -> Option<Self> {
    let api_key = settings.api_key.clone()?;
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .map_err(|e| error!(target: "certsim_backend", error = %e, "Failed to build HTTP client for OpenAI"))
      .ok()?;

    Some(Self {
      client,
      api_key,
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      fast_model: settings.fast_model.clone(),
      strong_model: settings.strong_model.clone(),
    })
  }

  fn model_for(&self, tier: ModelTier) -> &str {
    match tier {
      ModelTier::Fast => &self.fast_model,
      ModelTier::Strong => &self.strong_model,
    }
  }
}

#[async_trait]
impl Oracle for OpenAI {
  #[instrument(
    level = "info",
    skip(self, request),
    fields(model = %self.model_for(request.tier), json = request.format == ResponseFormat::JsonObject, user_len = request.user.len())
  )]
  async fn complete(&self, request: OracleRequest) -> Result<String, OracleError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model_for(request.tier).to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: request.system },
        ChatMessageReq { role: "user".into(), content: request.user },
      ],
      temperature: request.temperature,
      response_format: match request.format {
        ResponseFormat::JsonObject => Some(ResponseFormatReq { r#type: "json_object".into() }),
        ResponseFormat::Text => None,
      },
      max_tokens: request.max_tokens,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "certsim-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| OracleError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(OracleError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| OracleError::Parse(e.to_string()))?;
    let elapsed = start.elapsed();
    if let Some(usage) = &body.usage {
      info!(?elapsed, prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    } else {
      info!(?elapsed, "OpenAI response received");
    }

    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    if text.is_empty() {
      return Err(OracleError::Parse("empty completion".into()));
    }
    Ok(text)
  }

  fn describe(&self) -> String {
    format!("openai({}, {})", self.fast_model, self.strong_model)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormatReq>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormatReq { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
