//! Lalang · Language Exercise Backend
//!
//! - Axum HTTP + WebSocket chat API
//! - SQLite storage (sqlx), schema applied on boot
//! - OpenAI for sentence generation and translation review
//!
//! Important env variables (a `.env` file is read if present):
//!   PORT                : u16 (default 3000)
//!   DATABASE_URL        : default "sqlite:lalang.db?mode=rwc"
//!   OPENAI_API_KEY      : required for exercises to be generated and graded
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL   : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL : default "gpt-4o"
//!   OPENAI_TIMEOUT_SECS : default 20
//!   AGENT_CONFIG_PATH   : path to TOML config (prompts, defaults, catalog files)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use lalang_backend::config::AppConfig;
use lalang_backend::routes::build_router;
use lalang_backend::state::AppState;
use lalang_backend::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  dotenvy::dotenv().ok();
  telemetry::init_tracing();

  let config = AppConfig::from_env();

  // Storage, catalog, OpenAI backend, engine and chat controller.
  let state = Arc::new(AppState::new(&config).await?);

  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "lalang_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

  state.store.pool().close().await;
  info!(target: "lalang_backend", "Shutdown complete");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      error!(target: "lalang_backend", error = %e, "Cannot listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(e) => {
        error!(target: "lalang_backend", error = %e, "Cannot listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!(target: "lalang_backend", "Shutdown signal received");
}
