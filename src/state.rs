//! Application state shared by every handler.
//!
//! Holds the controller handle plus the config it was built from. Gateways
//! are created here: the JSON file store under `storage.data_dir` and the
//! mocked leaderboard.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::config::GameConfig;
use crate::controller::GameController;
use crate::leaderboard::{LeaderboardGateway, MockLeaderboard};
use crate::persistence::{JsonFileStore, PersistenceGateway};

#[derive(Clone)]
pub struct AppState {
  pub controller: GameController,
  pub config: Arc<GameConfig>,
}

impl AppState {
  /// Loads the stored profile (or starts blank) and spawns the controller.
  /// The join handle resolves after shutdown once pending writes are flushed.
  #[instrument(level = "info", skip_all)]
  pub async fn from_config(config: GameConfig) -> (Self, JoinHandle<()>) {
    let store: Arc<dyn PersistenceGateway> = Arc::new(JsonFileStore::new(config.storage.data_dir.clone()));
    let leaderboard: Arc<dyn LeaderboardGateway> = Arc::new(MockLeaderboard::new(
      config.submit_latency(),
      config.leaderboard.share_base_url.clone(),
      !config.leaderboard.offline,
    ));
    Self::with_gateways(config, store, leaderboard).await
  }

  pub async fn with_gateways(
    config: GameConfig,
    store: Arc<dyn PersistenceGateway>,
    leaderboard: Arc<dyn LeaderboardGateway>,
  ) -> (Self, JoinHandle<()>) {
    let profile = match store.load().await {
      Ok(Some(profile)) => {
        info!(target: "sportpulse_backend", username = %profile.username, level = profile.stats.level, games = profile.stats.games_played, "Loaded stored profile");
        profile
      }
      Ok(None) => {
        info!(target: "sportpulse_backend", "No stored profile; starting fresh");
        Default::default()
      }
      Err(e) => {
        error!(target: "sportpulse_backend", error = %e, "Failed to load stored profile; starting fresh");
        Default::default()
      }
    };

    let (controller, task) = GameController::spawn(profile, store, leaderboard, config.controller_settings());
    (Self { controller, config: Arc::new(config) }, task)
  }
}
