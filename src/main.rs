//! Certification Simulator · Backend
//!
//! - Axum HTTP API
//! - Optional OpenAI integration (via environment variables)
//! - Memory or Firestore persistence
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   OPENAI_API_KEY        : enables OpenAI integration if present
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL     : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL   : default "gpt-4o"
//!   OPENAI_TIMEOUT_SECS   : per-call timeout (default 30)
//!   STORE_BACKEND         : "memory" (default), "firestore" or "none"
//!   FIRESTORE_PROJECT_ID, FIRESTORE_ACCESS_TOKEN, FIRESTORE_EMULATOR_HOST
//!   CORS_ORIGINS          : comma-separated origins, "*" for any
//!   AGENT_CONFIG_PATH     : path to TOML config (prompts + module policies)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use certsim_backend::config::{load_agent_config_from_env, Settings};
use certsim_backend::routes::build_router;
use certsim_backend::state::AppState;
use certsim_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env();
  let state = Arc::new(AppState::from_settings(&settings, load_agent_config_from_env()));

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "certsim_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "certsim_backend", error = %e, "Failed to listen for shutdown signal");
  }
  info!(target: "certsim_backend", "Shutdown signal received");
}
