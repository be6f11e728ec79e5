//! Application state shared by every handler.
//!
//! This module owns:
//!   - the evaluation adapter (optional oracle, prompts, module policies)
//!   - the pending-passcode store and its delivery channel
//!   - the optional repository over the document store
//!
//! Missing collaborators never stop the server from booting: without an API key the
//! adapter serves fallbacks, and without a store the persistence endpoints answer 503.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::config::{AgentConfig, Settings, StoreBackend};
use crate::error::AppError;
use crate::logic::Evaluator;
use crate::openai::OpenAI;
use crate::oracle::Oracle;
use crate::otp::{LogNotifier, MemoryOtpStore, OtpStore, PasscodeNotifier};
use crate::policy::PolicyBook;
use crate::store::{DocumentStore, FirestoreStore, MemoryStore, Repository};

#[derive(Clone)]
pub struct AppState {
    pub evaluator: Evaluator,
    pub otp: Arc<dyn OtpStore>,
    pub notifier: Arc<dyn PasscodeNotifier>,
    pub repo: Option<Repository>,
    pub cors_origins: Vec<String>,
}

impl AppState {
    /// Build state from settings plus the optional TOML agent config.
    #[instrument(level = "info", skip_all)]
    pub fn from_settings(settings: &Settings, agent: Option<AgentConfig>) -> Self {
        let agent = agent.unwrap_or_default();
        let policies = PolicyBook::with_overrides(&agent.modules);
        info!(target: "certsim_backend", modules = ?policies.modules(), "Module policies loaded");

        let oracle: Option<Arc<dyn Oracle>> = match OpenAI::from_settings(&settings.oracle) {
            Some(oa) => {
                info!(target: "certsim_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, timeout_secs = settings.oracle.timeout_secs, "OpenAI enabled.");
                Some(Arc::new(oa))
            }
            None => {
                warn!(target: "certsim_backend", "OpenAI disabled (no OPENAI_API_KEY). Oracle-backed endpoints will serve fallbacks.");
                None
            }
        };

        let store: Option<Arc<dyn DocumentStore>> = match settings.store.backend {
            StoreBackend::Memory => Some(Arc::new(MemoryStore::new())),
            StoreBackend::Firestore => match FirestoreStore::from_settings(&settings.store) {
                Ok(fs) => Some(Arc::new(fs)),
                Err(e) => {
                    error!(target: "store", error = %e, "Firestore init failed; persistence disabled");
                    None
                }
            },
            StoreBackend::Disabled => None,
        };
        let repo = store.map(Repository::new);
        match &repo {
            Some(r) => info!(target: "store", backend = %r.describe(), "Persistence enabled."),
            None => warn!(target: "store", "Persistence disabled; profile and exam writes will answer 503."),
        }

        Self {
            evaluator: Evaluator::new(oracle, agent.prompts, policies),
            otp: Arc::new(MemoryOtpStore::new()),
            notifier: Arc::new(LogNotifier),
            repo,
            cors_origins: settings.cors_origins.clone(),
        }
    }

    /// The repository, or `Unavailable` when persistence is switched off.
    pub fn repo(&self) -> Result<&Repository, AppError> {
        self.repo
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("persistence is not configured".into()))
    }

    pub fn store_label(&self) -> String {
        self.repo.as_ref().map(Repository::describe).unwrap_or_else(|| "disabled".into())
    }
}
