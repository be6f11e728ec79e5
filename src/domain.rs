//! Domain models: evaluation results, generated module content, reports, stored records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Scored evaluation of one submission. Module-specific extras are flattened next to
/// `score`/`feedback` so the record stays a single flat object.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
  pub score: f64,
  pub feedback: String,
  #[serde(flatten)]
  pub details: Map<String, Value>,
}

impl EvaluationResult {
  /// Degraded record handed downstream when the oracle could not score the submission.
  pub fn fallback(feedback: &str) -> Self {
    Self { score: 0.0, feedback: feedback.to_string(), details: Map::new() }
  }
}

/// Payload shape a module's generated content takes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentShape {
  /// Passage plus multiple-choice questions (reading, listening).
  Comprehension,
  /// Title plus task text (writing, and any unknown module).
  #[default]
  Composition,
  /// Sentence to read aloud plus a speaking prompt.
  Speaking,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
  pub question: String,
  #[serde(default)]
  pub options: Vec<String>,
  pub correct_answer: String,
}

/// Generated exam content. Untagged: the wire shape is exactly one of the variants.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ModuleContent {
  Comprehension { title: String, passage: String, questions: Vec<Question> },
  Composition { title: String, passage: String },
  Speaking { target_sentence: String, prompt: String },
}

/// Result of the quick writing grader.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WritingGrade {
  pub score: u8,
  pub feedback: String,
}

/// Per-module scores for the final report. Missing modules count as 0.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ModuleScores {
  #[serde(default)] pub reading: f64,
  #[serde(default)] pub writing: f64,
  #[serde(default)] pub listening: f64,
  #[serde(default)] pub speaking: f64,
}

impl ModuleScores {
  /// Clamp every score into 0..=100; NaN counts as 0.
  pub fn clamped(&self) -> Self {
    let c = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) };
    Self {
      reading: c(self.reading),
      writing: c(self.writing),
      listening: c(self.listening),
      speaking: c(self.speaking),
    }
  }

  pub fn entries(&self) -> [(&'static str, f64); 4] {
    [
      ("reading", self.reading),
      ("writing", self.writing),
      ("listening", self.listening),
      ("speaking", self.speaking),
    ]
  }

  /// Lowest-scoring module; ties resolve to the first in `entries` order.
  pub fn weakest(&self) -> (&'static str, f64) {
    self
      .entries()
      .into_iter()
      .fold(("reading", f64::INFINITY), |acc, e| if e.1 < acc.1 { e } else { acc })
  }

  pub fn average(&self) -> f64 {
    self.entries().iter().map(|(_, v)| v).sum::<f64>() / 4.0
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FinalReport {
  pub scores: ModuleScores,
  pub advice: String,
  pub steps: Vec<String>,
}

/// Stored in the `users` collection under `uid`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
  #[serde(skip)]
  pub uid: String,
  pub full_name: String,
  pub email: String,
  pub phone: Option<String>,
  pub birth_date: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Stored in the `exam_results` collection under a server-assigned id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExamRecord {
  pub user_id: String,
  pub module: String,
  pub content: Value,
  pub analysis: EvaluationResult,
  pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn evaluation_result_is_flat_on_the_wire() {
    let mut details = Map::new();
    details.insert("logic_errors".into(), json!(["missed inference"]));
    let r = EvaluationResult { score: 72.0, feedback: "Good".into(), details };
    let v = serde_json::to_value(&r).unwrap();
    assert_eq!(v, json!({"score": 72.0, "feedback": "Good", "logic_errors": ["missed inference"]}));
  }

  #[test]
  fn content_serializes_without_a_tag() {
    let c = ModuleContent::Speaking { target_sentence: "Hi".into(), prompt: "Say it".into() };
    assert_eq!(serde_json::to_value(&c).unwrap(), json!({"target_sentence": "Hi", "prompt": "Say it"}));
  }

  #[test]
  fn missing_scores_default_to_zero_and_are_clamped() {
    let s: ModuleScores = serde_json::from_value(json!({"reading": 140.0})).unwrap();
    let s = s.clamped();
    assert_eq!(s.reading, 100.0);
    assert_eq!(s.speaking, 0.0);
    assert_eq!(s.weakest().0, "writing");
  }
}
