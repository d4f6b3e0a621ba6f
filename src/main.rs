//! SportPulse · Sports Mini-Game Backend
//!
//! - Axum HTTP + WebSocket API in front of a single-writer game controller
//! - JSON-file persistence for the profile, session history and onboarding flag
//! - Mocked leaderboard / social sharing with simulated latency
//! - Static frontend fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   DATA_DIR               : persistence directory (default ./data)
//!   SPORTPULSE_CONFIG_PATH : path to TOML config (server/storage/leaderboard/session)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod profile;
mod progression;
mod achievements;
mod catalog;
mod session;
mod countdown;
mod persistence;
mod writer;
mod leaderboard;
mod controller;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::load_config_from_env;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = load_config_from_env();
  let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
  info!(target: "sportpulse_backend", data_dir = %config.storage.data_dir.display(), latency_ms = config.leaderboard.latency_ms, tick_ms = config.session.tick_ms, "Configuration ready");

  // Load the stored profile and start the controller task.
  let (state, controller_task) = AppState::from_config(config).await;
  let controller = state.controller.clone();

  let app = build_router(Arc::new(state));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "sportpulse_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

  // Stop the controller and let queued saves reach disk.
  controller.shutdown().await;
  if let Err(e) = controller_task.await {
    error!(target: "sportpulse_backend", error = %e, "Controller task failed");
  }
  info!(target: "sportpulse_backend", "Shut down cleanly");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "sportpulse_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "sportpulse_backend", "Shutdown signal received");
}
