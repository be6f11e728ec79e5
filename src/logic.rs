//! Evaluation adapter: the oracle-backed behaviors shared by the HTTP handlers.
//!
//! This includes:
//!   - scoring exam submissions with the module's policy
//!   - generating module content (passages, questions, tasks)
//!   - grading a single writing answer
//!   - building the final report
//!   - tutor chat replies
//!
//! Every operation returns an `Outcome`: one oracle attempt, and on any failure a
//! canned but well-formed value with the reason attached. Nothing here returns `Err`.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{ContentShape, EvaluationResult, FinalReport, ModuleContent, ModuleScores, Question, WritingGrade};
use crate::normalize::{answers_equivalent, capitalize_first, capitalize_option, capitalize_options, capitalize_steps};
use crate::oracle::{ask_json, ModelTier, Oracle, OracleError, OracleRequest, Outcome};
use crate::policy::{module_key, PolicyBook};
use crate::seeds::{fallback_content, fallback_report};
use crate::util::{content_as_text, fill_template, truncate_chars};

/// Upper bound on tutor replies, in characters.
pub const MAX_CHAT_REPLY_CHARS: usize = 600;
const CHAT_MAX_TOKENS: u32 = 220;
const ORACLE_DISABLED: &str = "oracle disabled";

#[derive(Clone)]
pub struct Evaluator {
  pub oracle: Option<Arc<dyn Oracle>>,
  pub prompts: Prompts,
  pub policies: PolicyBook,
}

impl Evaluator {
  pub fn new(oracle: Option<Arc<dyn Oracle>>, prompts: Prompts, policies: PolicyBook) -> Self {
    Self { oracle, prompts, policies }
  }

  fn oracle(&self) -> Result<&dyn Oracle, OracleError> {
    self.oracle.as_deref().ok_or(OracleError::Disabled)
  }

  /// Score one submission. Unknown modules are scored by the generic examiner.
  #[instrument(level = "info", skip(self, content), fields(%module, %level))]
  pub async fn evaluate_submission(&self, module: &str, level: &str, content: &Value) -> Outcome<EvaluationResult> {
    let (policy, known) = self.policies.lookup(module);
    if !known {
      warn!(target: "exam", %module, "Unknown module; using generic examiner policy");
    }

    let extra_fields: String = policy.output_fields.iter().map(|f| format!(", {f}")).collect();
    let user = fill_template(
      &self.prompts.evaluation_user_template,
      // Submitted text goes in last so braces inside it are never treated as placeholders.
      &[
        ("level", level),
        ("max_score", &format_score(policy.max_score)),
        ("extra_fields", &extra_fields),
        ("content", &content_as_text(content)),
      ],
    );

    let start = Instant::now();
    let scored = match self.oracle() {
      Ok(oracle) => {
        let req = OracleRequest::json(ModelTier::Strong, policy.system_prompt.clone(), user, 0.2);
        ask_json::<Value>(oracle, req).await.and_then(|v| parse_evaluation(v, policy.max_score))
      }
      Err(e) => Err(e),
    };

    let mut outcome = match scored {
      Ok(result) => {
        info!(target: "exam", elapsed = ?start.elapsed(), score = result.score, "Submission scored");
        Outcome::Answered(result)
      }
      Err(e) => {
        error!(target: "exam", elapsed = ?start.elapsed(), error = %e, "Evaluation failed; returning fallback record");
        Outcome::fallback(EvaluationResult::fallback(&self.prompts.evaluation_fallback_feedback), e.to_string())
      }
    };

    if policy.shape == ContentShape::Comprehension {
      if let Some(check) = auto_check(content) {
        match &mut outcome {
          Outcome::Answered(r) | Outcome::Fallback { value: r, .. } => {
            r.details.insert("auto_check".into(), check);
          }
        }
      }
    }
    outcome
  }

  /// Generate an exercise for `module` at `level`.
  #[instrument(level = "info", skip(self), fields(%module, %level))]
  pub async fn generate_content(&self, module: &str, level: &str) -> Outcome<ModuleContent> {
    let (policy, known) = self.policies.lookup(module);
    let label = if known { module_key(module) } else { "general English".to_string() };
    let shape = policy.shape;

    let template = match shape {
      ContentShape::Comprehension => &self.prompts.comprehension_user_template,
      ContentShape::Composition => &self.prompts.composition_user_template,
      ContentShape::Speaking => &self.prompts.speaking_user_template,
    };
    let user = fill_template(template, &[("module", &label), ("level", level)]);

    let generated = match self.oracle() {
      Ok(oracle) => {
        let req = OracleRequest::json(ModelTier::Strong, self.prompts.generation_system.clone(), user, 0.9);
        match ask_json::<Value>(oracle, req).await {
          Ok(v) => parse_content(shape, v),
          Err(e) => Err(e),
        }
      }
      Err(e) => Err(e),
    };

    match generated {
      Ok(content) => {
        info!(target: "exam", %label, ?shape, "Content generated");
        Outcome::Answered(normalize_content(content))
      }
      Err(e) => {
        error!(target: "exam", %label, error = %e, "Content generation failed; serving built-in exercise");
        Outcome::fallback(normalize_content(fallback_content(shape, &label, level)), e.to_string())
      }
    }
  }

  /// Quick 0-100 grade of one writing answer against its task prompt.
  #[instrument(level = "info", skip(self, content, prompt), fields(%level, content_len = content.len()))]
  pub async fn grade_writing(&self, content: &str, level: &str, prompt: &str) -> Outcome<WritingGrade> {
    #[derive(Deserialize)]
    struct Raw { score: Value, feedback: String }

    let user = fill_template(
      &self.prompts.writing_grade_user_template,
      &[("level", level), ("prompt", prompt), ("content", content)],
    );

    let graded = match self.oracle() {
      Ok(oracle) => {
        let req = OracleRequest::json(ModelTier::Strong, self.prompts.writing_grade_system.clone(), user, 0.2);
        ask_json::<Raw>(oracle, req).await.and_then(|raw| {
          let score = score_from(&raw.score).ok_or_else(|| OracleError::Parse(format!("bad score: {}", raw.score)))?;
          Ok(WritingGrade { score: score.round().clamp(0.0, 100.0) as u8, feedback: raw.feedback.trim().to_string() })
        })
      }
      Err(e) => Err(e),
    };

    match graded {
      Ok(grade) => Outcome::Answered(grade),
      Err(e) => {
        error!(target: "exam", error = %e, "Writing grade failed; returning fallback grade");
        Outcome::fallback(WritingGrade { score: 0, feedback: self.prompts.writing_fallback_feedback.clone() }, e.to_string())
      }
    }
  }

  /// Advice plus ordered next steps for a set of module scores.
  #[instrument(level = "info", skip(self, scores), fields(%level))]
  pub async fn final_report(&self, scores: &ModuleScores, level: &str) -> Outcome<FinalReport> {
    #[derive(Deserialize)]
    struct Raw { advice: String, #[serde(default)] steps: Vec<String> }

    let scores = scores.clamped();
    let fmt = |v: f64| format!("{v:.0}");
    let user = fill_template(
      &self.prompts.report_user_template,
      &[
        ("level", level),
        ("reading", &fmt(scores.reading)),
        ("writing", &fmt(scores.writing)),
        ("listening", &fmt(scores.listening)),
        ("speaking", &fmt(scores.speaking)),
      ],
    );

    let advised = match self.oracle() {
      Ok(oracle) => {
        let req = OracleRequest::json(ModelTier::Fast, self.prompts.report_system.clone(), user, 0.4);
        ask_json::<Raw>(oracle, req).await.and_then(|raw| {
          let steps = capitalize_steps(&raw.steps);
          if raw.advice.trim().is_empty() || steps.is_empty() {
            return Err(OracleError::Parse("report without advice or steps".into()));
          }
          Ok((capitalize_first(&raw.advice), steps))
        })
      }
      Err(e) => Err(e),
    };

    match advised {
      Ok((advice, steps)) => Outcome::Answered(FinalReport { scores, advice, steps }),
      Err(e) => {
        error!(target: "exam", error = %e, "Report generation failed; using canned advice");
        let (advice, steps) = fallback_report(&scores, level);
        Outcome::fallback(FinalReport { scores, advice, steps: capitalize_steps(&steps) }, e.to_string())
      }
    }
  }

  /// Short tutor reply, capped at `MAX_CHAT_REPLY_CHARS`.
  #[instrument(level = "info", skip(self, message), fields(message_len = message.len()))]
  pub async fn chat_reply(&self, message: &str) -> Outcome<String> {
    let message = message.trim();
    if message.is_empty() {
      return Outcome::fallback(self.prompts.chat_fallback_reply.clone(), "empty message");
    }
    let replied = match self.oracle() {
      Ok(oracle) => {
        let req = OracleRequest::text(ModelTier::Fast, self.prompts.chat_system.clone(), message, 0.5)
          .with_max_tokens(CHAT_MAX_TOKENS);
        oracle.complete(req).await
      }
      Err(e) => Err(e),
    };

    match replied {
      Ok(text) => Outcome::Answered(truncate_chars(text.trim(), MAX_CHAT_REPLY_CHARS)),
      Err(e) => {
        error!(target: "exam", error = %e, "Chat reply failed; using canned reply");
        Outcome::fallback(self.prompts.chat_fallback_reply.clone(), e.to_string())
      }
    }
  }

  pub fn oracle_label(&self) -> String {
    self.oracle.as_ref().map(|o| o.describe()).unwrap_or_else(|| ORACLE_DISABLED.to_string())
  }
}

// -------- Parsing & normalization --------

/// Turn the oracle's JSON object into a flat result record.
fn parse_evaluation(v: Value, max_score: f64) -> Result<EvaluationResult, OracleError> {
  let Value::Object(mut map) = v else {
    return Err(OracleError::Parse("evaluation is not a JSON object".into()));
  };
  if let Some(err) = map.get("error") {
    return Err(OracleError::Parse(format!("oracle reported an error: {err}")));
  }

  let score = map
    .remove("score")
    .as_ref()
    .and_then(score_from)
    .ok_or_else(|| OracleError::Parse("missing or non-numeric score".into()))?;
  let feedback = match map.remove("feedback") {
    Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
    Some(Value::Array(items)) if !items.is_empty() => {
      items.iter().map(content_as_text).collect::<Vec<_>>().join(" ")
    }
    _ => return Err(OracleError::Parse("missing feedback".into())),
  };

  Ok(EvaluationResult { score: score.clamp(0.0, max_score), feedback, details: map })
}

/// Numbers, or strings like "85" / "85/100".
fn score_from(v: &Value) -> Option<f64> {
  let n = match v {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.split('/').next().and_then(|p| p.trim().parse::<f64>().ok()),
    _ => None,
  }?;
  n.is_finite().then_some(n)
}

fn parse_content(shape: ContentShape, v: Value) -> Result<ModuleContent, OracleError> {
  #[derive(Deserialize)]
  struct Comprehension { title: String, passage: String, questions: Vec<Question> }
  #[derive(Deserialize)]
  struct Composition { title: String, passage: String }
  #[derive(Deserialize)]
  struct Speaking { target_sentence: String, prompt: String }

  let parse = |e: serde_json::Error| OracleError::Parse(e.to_string());
  let content = match shape {
    ContentShape::Comprehension => {
      let c: Comprehension = serde_json::from_value(v).map_err(parse)?;
      if c.questions.is_empty() {
        return Err(OracleError::Parse("comprehension exercise without questions".into()));
      }
      ModuleContent::Comprehension { title: c.title, passage: c.passage, questions: c.questions }
    }
    ContentShape::Composition => {
      let c: Composition = serde_json::from_value(v).map_err(parse)?;
      ModuleContent::Composition { title: c.title, passage: c.passage }
    }
    ContentShape::Speaking => {
      let s: Speaking = serde_json::from_value(v).map_err(parse)?;
      ModuleContent::Speaking { target_sentence: s.target_sentence, prompt: s.prompt }
    }
  };
  Ok(content)
}

/// Options and answers get sentence case; titles get a capital letter.
fn normalize_content(content: ModuleContent) -> ModuleContent {
  match content {
    ModuleContent::Comprehension { title, passage, questions } => ModuleContent::Comprehension {
      title: capitalize_first(&title),
      passage: passage.trim().to_string(),
      questions: questions
        .into_iter()
        .map(|q| Question {
          question: capitalize_first(&q.question),
          options: capitalize_options(&q.options),
          correct_answer: capitalize_option(&q.correct_answer),
        })
        .collect(),
    },
    ModuleContent::Composition { title, passage } => ModuleContent::Composition {
      title: capitalize_first(&title),
      passage: passage.trim().to_string(),
    },
    ModuleContent::Speaking { target_sentence, prompt } => ModuleContent::Speaking {
      target_sentence: capitalize_first(&target_sentence),
      prompt: capitalize_first(&prompt),
    },
  }
}

/// Local tolerant check of an answer sheet `{"answers": [{"given", "expected"}, ...]}`.
fn auto_check(content: &Value) -> Option<Value> {
  let answers = content.get("answers")?.as_array()?;
  let as_text = |v: &Value| match v {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  };

  let (mut matched, mut total) = (0usize, 0usize);
  for a in answers {
    let (Some(given), Some(expected)) = (a.get("given").and_then(as_text), a.get("expected").and_then(as_text)) else {
      continue;
    };
    total += 1;
    if answers_equivalent(&given, &expected) {
      matched += 1;
    }
  }
  (total > 0).then(|| json!({ "matched": matched, "total": total }))
}

fn format_score(v: f64) -> String {
  if v.fract() == 0.0 { format!("{v:.0}") } else { v.to_string() }
}
