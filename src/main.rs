//! Hanzi Tutor · Chinese-language learning service backend
//!
//! - Axum HTTP + SSE API (spec §6)
//! - Durable lease-based translation job engine (spec §4.E) backed by SQLite
//! - CC-CEDICT dictionary, response parser, and an OpenAI-compatible
//!   translation provider facade (spec §4.A-C)
//! - SM-2 spaced-repetition scheduler (spec §4.G)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   LLM_API_KEY           : enables the translation provider if present
//!   LLM_BASE_URL          : default "https://api.openai.com/v1" (must end in /v1)
//!   LLM_MODEL             : default "gpt-4o-mini"
//!   SESSION_SECRET        : shared-secret session cookie value
//!   APP_PASSWORD          : login password
//!   DB_PATH               : sqlite file path (default "./data/app.db")
//!   CEDICT_PATH           : CC-CEDICT file path (default "./data/cedict_ts.u8")
//!   DEBUG                 : "1"/"true" to enable debug behavior
//!   SESSION_TTL_HOURS     : cookie lifetime in hours (default 168)
//!   LEASE_SECONDS         : job lease duration (default 30)
//!   SEGMENT_PAUSE_MS      : inter-segment pacing pause (default 15)
//!   PROVIDER_TIMEOUT_SECS : upstream LLM request timeout ceiling (default 600)
//!   LOG_LEVEL / LOG_FORMAT: tracing filter / "pretty" (default) or "json"

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use hanzi_tutor::config::AppConfig;
use hanzi_tutor::routes::build_router;
use hanzi_tutor::state::AppState;
use hanzi_tutor::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = AppConfig::from_env();
  let port = config.port;

  // Connects the store (running migrations), loads the CC-CEDICT dictionary,
  // and constructs the provider if configured (spec §5 startup lifecycle).
  let state = AppState::new(config).await?;

  // Crash recovery: re-enter the pipeline for every row left pending or
  // processing with no live lease, before accepting new connections.
  state.jobs.resume_restartable_jobs().await;

  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "hanzi_tutor", %addr, "HTTP server listening");
  if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
    error!(target: "hanzi_tutor", error = %e, "server exited with error");
    return Err(e.into());
  }
  Ok(())
}

/// Waits for Ctrl-C (or SIGTERM on unix) so in-flight job workers get a
/// chance to finish their current segment write before the process exits
/// (spec §5: "shutdown is graceful only in the sense that in-flight workers
/// finish their current segment write or are abandoned").
async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
  };

  #[cfg(unix)]
  let terminate = async {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .expect("failed to install SIGTERM handler")
      .recv()
      .await;
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!(target: "hanzi_tutor", "shutdown signal received; draining in-flight requests");
}
