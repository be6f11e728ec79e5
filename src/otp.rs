//! One-time passcode issuance and verification.
//!
//! State per email: {no pending code} --issue--> {pending C} --verify(C)--> {no pending code}.
//! A wrong candidate leaves C in place; a new issuance replaces C. Codes never expire.

use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::normalize::normalize_email;

/// Closed range the 8-digit code is drawn from.
pub const CODE_MIN: u32 = 10_000_000;
pub const CODE_MAX: u32 = 99_999_999;

#[derive(Debug, Error)]
pub enum OtpError {
  #[error("passcode store error: {0}")]
  Store(String),
  #[error("passcode delivery error: {0}")]
  Delivery(String),
}

/// Pending-code storage. Keys arrive already normalized.
#[async_trait]
pub trait OtpStore: Send + Sync {
  /// Register `code` for `email`, replacing any pending one.
  async fn put(&self, email: &str, code: String) -> Result<(), OtpError>;
  /// Remove the pending code iff it equals `candidate`. Compare and delete are atomic.
  async fn take_if_matches(&self, email: &str, candidate: &str) -> Result<bool, OtpError>;
  /// Drop any pending code for `email`.
  async fn invalidate(&self, email: &str) -> Result<(), OtpError>;
}

/// Process-local store: one mutex over the whole map. Operations are O(1) and short.
#[derive(Default)]
pub struct MemoryOtpStore {
  codes: Mutex<HashMap<String, String>>,
}

impl MemoryOtpStore {
  pub fn new() -> Self {
    Self::default()
  }

  #[cfg(test)]
  pub async fn pending_count(&self) -> usize {
    self.codes.lock().await.len()
  }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
  async fn put(&self, email: &str, code: String) -> Result<(), OtpError> {
    self.codes.lock().await.insert(email.to_string(), code);
    Ok(())
  }

  async fn take_if_matches(&self, email: &str, candidate: &str) -> Result<bool, OtpError> {
    let mut codes = self.codes.lock().await;
    match codes.get(email) {
      Some(saved) if saved == candidate => {
        codes.remove(email);
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn invalidate(&self, email: &str) -> Result<(), OtpError> {
    self.codes.lock().await.remove(email);
    Ok(())
  }
}

/// Out-of-band delivery of a freshly issued code (mail, SMS, ...).
#[async_trait]
pub trait PasscodeNotifier: Send + Sync {
  async fn deliver(&self, email: &str, code: &str) -> Result<(), OtpError>;
}

/// Development delivery: writes the code to the `otp` log target.
pub struct LogNotifier;

#[async_trait]
impl PasscodeNotifier for LogNotifier {
  async fn deliver(&self, email: &str, code: &str) -> Result<(), OtpError> {
    info!(target: "otp", %email, %code, "Passcode issued (log delivery)");
    Ok(())
  }
}

pub fn generate_code() -> String {
  rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Issue a new code for `email` and hand it to the notifier. The code is never returned.
#[instrument(level = "info", skip(store, notifier, email))]
pub async fn issue_passcode(
  store: &dyn OtpStore,
  notifier: &dyn PasscodeNotifier,
  email: &str,
) -> Result<(), AppError> {
  let email = normalize_email(email);
  let code = generate_code();
  store.put(&email, code.clone()).await?;
  notifier.deliver(&email, &code).await?;
  info!(target: "otp", %email, "Passcode registered");
  Ok(())
}

/// Check `code` against the pending one for `email`, consuming it on success.
/// Unknown email and wrong code produce the same error.
#[instrument(level = "info", skip(store, email, code))]
pub async fn verify_passcode(store: &dyn OtpStore, email: &str, code: &str) -> Result<(), AppError> {
  let email = normalize_email(email);
  if store.take_if_matches(&email, code.trim()).await? {
    info!(target: "otp", %email, "Passcode verified");
    Ok(())
  } else {
    warn!(target: "otp", %email, "Passcode verification failed");
    Err(AppError::InvalidPasscode)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::{Arc, Mutex as StdMutex};

  /// Remembers the last code delivered per email.
  #[derive(Default)]
  pub struct CapturingNotifier {
    pub sent: StdMutex<HashMap<String, String>>,
  }

  impl CapturingNotifier {
    pub fn code_for(&self, email: &str) -> Option<String> {
      self.sent.lock().unwrap().get(email).cloned()
    }
  }

  #[async_trait]
  impl PasscodeNotifier for CapturingNotifier {
    async fn deliver(&self, email: &str, code: &str) -> Result<(), OtpError> {
      self.sent.lock().unwrap().insert(email.to_string(), code.to_string());
      Ok(())
    }
  }

  #[test]
  fn generated_codes_have_eight_digits() {
    for _ in 0..200 {
      let code = generate_code();
      assert_eq!(code.len(), 8);
      assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
  }

  #[tokio::test]
  async fn code_verifies_exactly_once() {
    let store = MemoryOtpStore::new();
    let notifier = CapturingNotifier::default();
    issue_passcode(&store, &notifier, "a@b.com").await.unwrap();
    let code = notifier.code_for("a@b.com").unwrap();

    assert!(verify_passcode(&store, "a@b.com", &code).await.is_ok());
    assert!(matches!(verify_passcode(&store, "a@b.com", &code).await, Err(AppError::InvalidPasscode)));
  }

  #[tokio::test]
  async fn verify_without_issue_fails() {
    let store = MemoryOtpStore::new();
    let err = verify_passcode(&store, "nobody@b.com", "12345678").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidPasscode));
  }

  #[tokio::test]
  async fn reissue_replaces_previous_code() {
    let store = MemoryOtpStore::new();
    let notifier = CapturingNotifier::default();
    issue_passcode(&store, &notifier, "a@b.com").await.unwrap();
    let first = notifier.code_for("a@b.com").unwrap();
    // Codes can collide; reissue until distinct.
    let mut second = first.clone();
    while second == first {
      issue_passcode(&store, &notifier, "a@b.com").await.unwrap();
      second = notifier.code_for("a@b.com").unwrap();
    }

    assert!(verify_passcode(&store, "a@b.com", &first).await.is_err());
    assert!(verify_passcode(&store, "a@b.com", &second).await.is_ok());
    assert_eq!(store.pending_count().await, 0);
  }

  #[tokio::test]
  async fn wrong_code_keeps_pending_code() {
    let store = MemoryOtpStore::new();
    store.put("a@b.com", "11111111".into()).await.unwrap();
    assert!(verify_passcode(&store, "a@b.com", "22222222").await.is_err());
    assert!(verify_passcode(&store, "a@b.com", " 11111111 ").await.is_ok());
  }

  #[tokio::test]
  async fn email_case_and_whitespace_are_ignored() {
    let store = MemoryOtpStore::new();
    let notifier = CapturingNotifier::default();
    issue_passcode(&store, &notifier, "User@Example.com ").await.unwrap();
    let code = notifier.code_for("user@example.com").unwrap();
    assert!(verify_passcode(&store, "user@example.com", &code).await.is_ok());
  }

  #[tokio::test]
  async fn invalidate_drops_pending_code() {
    let store = MemoryOtpStore::new();
    store.put("a@b.com", "11111111".into()).await.unwrap();
    store.invalidate("a@b.com").await.unwrap();
    assert!(!store.take_if_matches("a@b.com", "11111111").await.unwrap());
  }

  #[tokio::test]
  async fn concurrent_verifications_succeed_once() {
    let store = Arc::new(MemoryOtpStore::new());
    store.put("a@b.com", "11111111".into()).await.unwrap();
    let mut handles = Vec::new();
    for _ in 0..16 {
      let s = store.clone();
      handles.push(tokio::spawn(async move { s.take_if_matches("a@b.com", "11111111").await.unwrap() }));
    }
    let mut wins = 0;
    for h in handles {
      if h.await.unwrap() { wins += 1; }
    }
    assert_eq!(wins, 1);
  }
}
