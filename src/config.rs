//! Loading service configuration from TOML.
//!
//! The file is located through `SPORTPULSE_CONFIG_PATH`; every section and key
//! is optional. `PORT` and `DATA_DIR` override the file when set.
//!
//! ```toml
//! [server]
//! port = 3000
//!
//! [storage]
//! data_dir = "./data"
//!
//! [leaderboard]
//! latency_ms = 1000
//! offline = false
//! share_base_url = "https://sportpulse.com/share"
//! submit_on_tie = true
//! auto_submit = true
//!
//! [session]
//! tick_ms = 1000
//! ```

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{error, info};

use crate::controller::ControllerSettings;

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct GameConfig {
  pub server: ServerConfig,
  pub storage: StorageConfig,
  pub leaderboard: LeaderboardConfig,
  pub session: SessionConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self { port: 3000 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  pub data_dir: PathBuf,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self { data_dir: PathBuf::from("./data") }
  }
}

/// Mock leaderboard behaviour and the auto-submit policy.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
  /// Simulated round trip of a score submission.
  pub latency_ms: u64,
  /// Start with connectivity switched off.
  pub offline: bool,
  pub share_base_url: String,
  pub submit_on_tie: bool,
  pub auto_submit: bool,
}

impl Default for LeaderboardConfig {
  fn default() -> Self {
    Self {
      latency_ms: 1000,
      offline: false,
      share_base_url: "https://sportpulse.com/share".into(),
      submit_on_tie: true,
      auto_submit: true,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  /// One countdown step.
  pub tick_ms: u64,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self { tick_ms: 1000 }
  }
}

impl GameConfig {
  pub fn controller_settings(&self) -> ControllerSettings {
    ControllerSettings {
      tick: Duration::from_millis(self.session.tick_ms.max(1)),
      auto_submit: self.leaderboard.auto_submit,
      submit_on_tie: self.leaderboard.submit_on_tie,
    }
  }

  pub fn submit_latency(&self) -> Duration {
    Duration::from_millis(self.leaderboard.latency_ms)
  }

  fn apply_env_overrides(mut self) -> Self {
    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
      self.server.port = port;
    }
    if let Ok(dir) = std::env::var("DATA_DIR") {
      if !dir.is_empty() {
        self.storage.data_dir = PathBuf::from(dir);
      }
    }
    self
  }
}

/// Reads the TOML file named by SPORTPULSE_CONFIG_PATH. On any IO/parse error,
/// logs it and falls back to defaults; env overrides apply either way.
pub fn load_config_from_env() -> GameConfig {
  let from_file = std::env::var("SPORTPULSE_CONFIG_PATH").ok().and_then(|path| {
    match std::fs::read_to_string(&path) {
      Ok(s) => match toml::from_str::<GameConfig>(&s) {
        Ok(cfg) => {
          info!(target: "sportpulse_backend", %path, "Loaded config (TOML)");
          Some(cfg)
        }
        Err(e) => {
          error!(target: "sportpulse_backend", %path, error = %e, "Failed to parse TOML config");
          None
        }
      },
      Err(e) => {
        error!(target: "sportpulse_backend", %path, error = %e, "Failed to read TOML config file");
        None
      }
    }
  });
  from_file.unwrap_or_default().apply_env_overrides()
}
