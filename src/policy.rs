//! Per-module evaluation policies.
//!
//! A policy is the examiner persona (system prompt), the extra fields the oracle must
//! return, the score ceiling, and the shape of generated content. Lookups never fail:
//! unknown modules get the generic examiner.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::domain::ContentShape;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ModulePolicy {
    pub system_prompt: String,
    #[serde(default)]
    pub output_fields: Vec<String>,
    #[serde(default = "default_max_score")]
    pub max_score: f64,
    #[serde(default)]
    pub shape: ContentShape,
}

fn default_max_score() -> f64 {
    100.0
}

const LISTENING_PROMPT: &str = r#"
You are a Cambridge/IELTS Listening examiner.
Compare the candidate's answers with the transcript.
RULES:
- Accept regional spelling variants as correct (e.g. 'center' for 'centre').
- If the answer is a number, accept digits or words ('7' or 'seven').
- Check whether the candidate caught the distractors (when a speaker changes their mind).
Respond with JSON only.
"#;

const READING_PROMPT: &str = r#"
You are a Reading Comprehension expert.
Judge whether the candidate understood the text or only copied words from it.
RULES:
- Evaluate the accuracy of inferences (what is understood but not written).
- For multiple-choice questions, explain why the other options were wrong.
Respond with JSON only.
"#;

const WRITING_PROMPT: &str = r#"
You are a Cambridge/IELTS Writing examiner.
Assess task achievement, coherence and cohesion, lexical resource, and grammatical range and accuracy.
Quote the candidate's mistakes in 'corrections' together with the corrected form.
Respond with JSON only.
"#;

const SPEAKING_PROMPT: &str = r#"
You are a Cambridge/IELTS Speaking examiner working from a transcript.
Assess fluency, accuracy against the target sentence, and likely pronunciation problems
visible in the transcript (missing endings, substituted words).
Respond with JSON only.
"#;

const GENERIC_PROMPT: &str = "You are a general English examiner. Respond with JSON only.";

/// All known policies plus the generic fallback.
#[derive(Clone, Debug)]
pub struct PolicyBook {
    policies: HashMap<String, ModulePolicy>,
    generic: ModulePolicy,
}

impl Default for PolicyBook {
    fn default() -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            "listening".to_string(),
            policy(LISTENING_PROMPT, &["key_details_missed"], ContentShape::Comprehension),
        );
        policies.insert(
            "reading".to_string(),
            policy(READING_PROMPT, &["logic_errors"], ContentShape::Comprehension),
        );
        policies.insert(
            "writing".to_string(),
            policy(WRITING_PROMPT, &["corrections", "suggestions"], ContentShape::Composition),
        );
        policies.insert(
            "speaking".to_string(),
            policy(SPEAKING_PROMPT, &["corrections", "suggestions"], ContentShape::Speaking),
        );
        Self {
            policies,
            generic: policy(GENERIC_PROMPT, &["corrections", "suggestions"], ContentShape::Composition),
        }
    }
}

fn policy(prompt: &str, fields: &[&str], shape: ContentShape) -> ModulePolicy {
    ModulePolicy {
        system_prompt: prompt.trim().to_string(),
        output_fields: fields.iter().map(|f| f.to_string()).collect(),
        max_score: default_max_score(),
        shape,
    }
}

impl PolicyBook {
    /// Built-ins with `overrides` layered on top (same id replaces, new id adds).
    /// A `max_score` that is not a positive finite number is reset to the default.
    pub fn with_overrides(overrides: &HashMap<String, ModulePolicy>) -> Self {
        let mut book = Self::default();
        for (id, p) in overrides {
            let mut p = p.clone();
            if !(p.max_score.is_finite() && p.max_score > 0.0) {
                warn!(target: "certsim_backend", module = %id, max_score = p.max_score, "Invalid max_score in module override; using default");
                p.max_score = default_max_score();
            }
            book.policies.insert(module_key(id), p);
        }
        book
    }

    /// Policy for `module`, or the generic examiner. The bool says whether it was a known module.
    pub fn lookup(&self, module: &str) -> (&ModulePolicy, bool) {
        match self.policies.get(&module_key(module)) {
            Some(p) => (p, true),
            None => (&self.generic, false),
        }
    }

    #[cfg(test)]
    pub fn get(&self, module: &str) -> &ModulePolicy {
        self.lookup(module).0
    }

    pub fn modules(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

pub fn module_key(module: &str) -> String {
    module.trim().to_lowercase()
}
