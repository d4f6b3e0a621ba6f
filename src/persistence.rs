//! Persistence gateway: profile, session history and the onboarding flag.
//!
//! [`JsonFileStore`] keeps everything in one JSON document under a data
//! directory:
//!
//! | file | content |
//! |---|---|
//! | `gamedata.json` | `{ userProfile, gameHistory, lastUpdated, version }` |
//! | `gamedata_backup.json` | previous `gamedata.json`, refreshed before each overwrite |
//! | `gamedata_backup_<timestamp>.json` | explicit backups |
//! | `onboarding.json` | `{ "completed": bool }` |

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, instrument, warn};

use crate::domain::HistoryEntry;
use crate::error::{PersistenceError, StoreFailure};
use crate::profile::UserProfile;

/// Most recent history entries kept; older ones are dropped.
pub const HISTORY_CAP: usize = 100;
const FORMAT_VERSION: &str = "1.0";

const DATA_FILE: &str = "gamedata.json";
const BACKUP_FILE: &str = "gamedata_backup.json";
const ONBOARDING_FILE: &str = "onboarding.json";

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
  /// `None` when nothing has been saved yet.
  async fn load(&self) -> Result<Option<UserProfile>, PersistenceError>;
  async fn save(&self, profile: &UserProfile) -> Result<(), PersistenceError>;
  async fn load_history(&self) -> Result<Vec<HistoryEntry>, PersistenceError>;
  async fn append_history(&self, entry: HistoryEntry) -> Result<(), PersistenceError>;
  async fn export(&self) -> Result<Vec<u8>, PersistenceError>;
  /// Validates the blob before anything is written.
  async fn import(&self, blob: &[u8]) -> Result<(), PersistenceError>;
  /// Removes all stored data, including the onboarding flag.
  async fn reset(&self) -> Result<(), PersistenceError>;
  async fn backup(&self) -> Result<(), PersistenceError>;
  async fn restore(&self) -> Result<(), PersistenceError>;
  async fn is_onboarding_completed(&self) -> Result<bool, PersistenceError>;
  async fn mark_onboarding_completed(&self) -> Result<(), PersistenceError>;
  /// Combined size in bytes of the data and backup files.
  async fn data_size(&self) -> Result<u64, PersistenceError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
  #[serde(default)]
  pub user_profile: Option<UserProfile>,
  #[serde(default)]
  pub game_history: Vec<HistoryEntry>,
  pub last_updated: DateTime<Utc>,
  pub version: String,
}

impl Default for GameData {
  fn default() -> Self {
    Self { user_profile: None, game_history: Vec::new(), last_updated: Utc::now(), version: FORMAT_VERSION.to_string() }
  }
}

#[derive(Serialize, Deserialize)]
struct OnboardingFlag {
  completed: bool,
}

pub struct JsonFileStore {
  dir: PathBuf,
  /// Serializes read-modify-write cycles on the data file.
  lock: Mutex<()>,
}

impl JsonFileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into(), lock: Mutex::new(()) }
  }

  fn data_path(&self) -> PathBuf {
    self.dir.join(DATA_FILE)
  }

  fn backup_path(&self) -> PathBuf {
    self.dir.join(BACKUP_FILE)
  }

  fn onboarding_path(&self) -> PathBuf {
    self.dir.join(ONBOARDING_FILE)
  }

  async fn read_data(&self) -> Result<GameData, StoreFailure> {
    match fs::read(self.data_path()).await {
      Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GameData::default()),
      Err(e) => Err(e.into()),
    }
  }

  /// Copies the current data file to the rolling backup, then overwrites it.
  async fn write_data(&self, mut data: GameData) -> Result<(), StoreFailure> {
    fs::create_dir_all(&self.dir).await?;
    let path = self.data_path();
    if fs::try_exists(&path).await? {
      fs::copy(&path, self.backup_path()).await?;
    }
    data.last_updated = Utc::now();
    data.version = FORMAT_VERSION.to_string();
    replace_file(&path, &serde_json::to_vec_pretty(&data)?).await?;
    Ok(())
  }

  async fn write_onboarding(&self, completed: bool) -> Result<(), StoreFailure> {
    fs::create_dir_all(&self.dir).await?;
    replace_file(&self.onboarding_path(), &serde_json::to_vec(&OnboardingFlag { completed })?).await?;
    Ok(())
  }
}

/// Writes to a sibling temp file and renames it over `path`, so readers see
/// either the old or the new content.
async fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
  let tmp = path.with_extension("json.tmp");
  fs::write(&tmp, bytes).await?;
  fs::rename(&tmp, path).await
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
  match fs::remove_file(path).await {
    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}

async fn file_len(path: &Path) -> std::io::Result<u64> {
  match fs::metadata(path).await {
    Ok(m) => Ok(m.len()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
    Err(e) => Err(e),
  }
}

#[async_trait]
impl PersistenceGateway for JsonFileStore {
  #[instrument(level = "debug", skip(self))]
  async fn load(&self) -> Result<Option<UserProfile>, PersistenceError> {
    let data = self.read_data().await.map_err(PersistenceError::load)?;
    debug!(target: "persistence", found = data.user_profile.is_some(), history = data.game_history.len(), "Loaded game data");
    Ok(data.user_profile)
  }

  #[instrument(level = "debug", skip_all, fields(username = %profile.username))]
  async fn save(&self, profile: &UserProfile) -> Result<(), PersistenceError> {
    let _guard = self.lock.lock().await;
    let mut data = self.read_data().await.map_err(PersistenceError::save)?;
    data.user_profile = Some(profile.clone());
    self.write_data(data).await.map_err(PersistenceError::save)?;
    debug!(target: "persistence", "Profile saved");
    Ok(())
  }

  async fn load_history(&self) -> Result<Vec<HistoryEntry>, PersistenceError> {
    Ok(self.read_data().await.map_err(PersistenceError::load)?.game_history)
  }

  #[instrument(level = "debug", skip_all, fields(total_score = entry.total_score))]
  async fn append_history(&self, entry: HistoryEntry) -> Result<(), PersistenceError> {
    let _guard = self.lock.lock().await;
    let mut data = self.read_data().await.map_err(PersistenceError::save)?;
    data.game_history.push(entry);
    if data.game_history.len() > HISTORY_CAP {
      let excess = data.game_history.len() - HISTORY_CAP;
      data.game_history.drain(..excess);
    }
    self.write_data(data).await.map_err(PersistenceError::save)
  }

  async fn export(&self) -> Result<Vec<u8>, PersistenceError> {
    match fs::read(self.data_path()).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        serde_json::to_vec_pretty(&GameData::default()).map_err(PersistenceError::export)
      }
      Err(e) => Err(PersistenceError::export(e)),
    }
  }

  #[instrument(level = "info", skip_all, fields(bytes = blob.len()))]
  async fn import(&self, blob: &[u8]) -> Result<(), PersistenceError> {
    let data: GameData = serde_json::from_slice(blob).map_err(PersistenceError::import)?;
    let _guard = self.lock.lock().await;
    self.write_data(data).await.map_err(PersistenceError::import)?;
    info!(target: "persistence", "Game data imported");
    Ok(())
  }

  #[instrument(level = "info", skip(self))]
  async fn reset(&self) -> Result<(), PersistenceError> {
    let _guard = self.lock.lock().await;
    for path in [self.data_path(), self.backup_path(), self.onboarding_path()] {
      remove_if_present(&path).await.map_err(PersistenceError::reset)?;
    }
    warn!(target: "persistence", dir = %self.dir.display(), "Game data reset");
    Ok(())
  }

  async fn backup(&self) -> Result<(), PersistenceError> {
    let _guard = self.lock.lock().await;
    let data = self.read_data().await.map_err(PersistenceError::backup)?;
    let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let path = self.dir.join(format!("gamedata_backup_{stamp}.json"));
    let bytes = serde_json::to_vec_pretty(&data).map_err(PersistenceError::backup)?;
    fs::create_dir_all(&self.dir).await.map_err(PersistenceError::backup)?;
    replace_file(&path, &bytes).await.map_err(PersistenceError::backup)?;
    replace_file(&self.backup_path(), &bytes).await.map_err(PersistenceError::backup)?;
    info!(target: "persistence", path = %path.display(), "Backup written");
    Ok(())
  }

  async fn restore(&self) -> Result<(), PersistenceError> {
    let _guard = self.lock.lock().await;
    let bytes = match fs::read(self.backup_path()).await {
      Ok(b) => b,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(PersistenceError::NoBackupFound),
      Err(e) => return Err(PersistenceError::restore(e)),
    };
    serde_json::from_slice::<GameData>(&bytes).map_err(PersistenceError::restore)?;
    replace_file(&self.data_path(), &bytes).await.map_err(PersistenceError::restore)?;
    info!(target: "persistence", "Backup restored");
    Ok(())
  }

  async fn is_onboarding_completed(&self) -> Result<bool, PersistenceError> {
    match fs::read(self.onboarding_path()).await {
      Ok(bytes) => Ok(serde_json::from_slice::<OnboardingFlag>(&bytes).map_err(PersistenceError::load)?.completed),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(PersistenceError::load(e)),
    }
  }

  async fn mark_onboarding_completed(&self) -> Result<(), PersistenceError> {
    self.write_onboarding(true).await.map_err(PersistenceError::save)
  }

  async fn data_size(&self) -> Result<u64, PersistenceError> {
    let data = file_len(&self.data_path()).await.map_err(PersistenceError::load)?;
    let backup = file_len(&self.backup_path()).await.map_err(PersistenceError::load)?;
    Ok(data + backup)
  }
}
