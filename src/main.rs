//! RapidFAMAT · adaptive drill backend
//!
//! - Axum HTTP + WebSocket API
//! - Nearest-difficulty problem selection driven by a rolling rating
//! - Open / Sprint / Contest sessions, one engine per WebSocket connection
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   ENGINE_CONFIG_PATH : path to TOML config (engine rules + optional problem bank)
//!   STATS_PATH         : JSON file for best streak / all-time solved / dark mode
//!   SELECTOR_URL       : fetch session problems from another instance instead of the local catalog
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use rapidfamat_backend::routes::build_router;
use rapidfamat_backend::state::AppState;
use rapidfamat_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // A catalog missing a round is a deployment fault: refuse to start.
  let state = match AppState::from_env() {
    Ok(s) => Arc::new(s),
    Err(e) => {
      error!(target: "rapidfamat_backend", error = %e, "Catalog validation failed");
      return Err(e.into());
    }
  };

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "rapidfamat_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "rapidfamat_backend", error = %e, "Failed to listen for Ctrl+C");
    std::future::pending::<()>().await;
  }
  info!(target: "rapidfamat_backend", "Shutdown signal received");
}
