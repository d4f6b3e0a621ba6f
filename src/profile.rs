//! Player profile, preferences and the onboarding handoff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::SkillLevel;
use crate::error::ValidationError;
use crate::progression::PlayerStats;

pub const DEFAULT_AVATAR: &str = "person.circle.fill";
const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GamePreferences {
  pub sound_enabled: bool,
  pub music_enabled: bool,
  pub haptic_feedback_enabled: bool,
  pub notifications_enabled: bool,
  pub preferred_skill_level: SkillLevel,
  pub auto_save_enabled: bool,
  pub accessibility_mode: bool,
  pub color_blind_support: bool,
}

impl Default for GamePreferences {
  fn default() -> Self {
    Self {
      sound_enabled: true,
      music_enabled: true,
      haptic_feedback_enabled: true,
      notifications_enabled: true,
      preferred_skill_level: SkillLevel::Beginner,
      auto_save_enabled: true,
      accessibility_mode: false,
      color_blind_support: false,
    }
  }
}

/// The unit of truth that gets persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
  pub id: Uuid,
  pub username: String,
  pub avatar: String,
  pub stats: PlayerStats,
  pub preferences: GamePreferences,
  pub created_at: DateTime<Utc>,
  pub last_played_at: DateTime<Utc>,
}

impl Default for UserProfile {
  fn default() -> Self {
    let now = Utc::now();
    Self {
      id: Uuid::new_v4(),
      username: String::new(),
      avatar: DEFAULT_AVATAR.to_string(),
      stats: PlayerStats::default(),
      preferences: GamePreferences::default(),
      created_at: now,
      last_played_at: now,
    }
  }
}

impl UserProfile {
  /// Name shown on the leaderboard.
  pub fn display_name(&self) -> &str {
    if self.username.is_empty() { "Anonymous" } else { &self.username }
  }
}

/// What the external onboarding flow hands over.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
  pub username: String,
  #[serde(default)]
  pub avatar: Option<String>,
  #[serde(default)]
  pub skill_level: SkillLevel,
  #[serde(default)]
  pub notifications_granted: bool,
}

impl OnboardingRequest {
  /// Validates the username and builds the initial profile.
  pub fn into_profile(self) -> Result<UserProfile, ValidationError> {
    let username = validate_username(&self.username)?;
    let mut profile = UserProfile {
      username,
      avatar: self.avatar.filter(|a| !a.is_empty()).unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
      preferences: GamePreferences {
        notifications_enabled: self.notifications_granted,
        preferred_skill_level: self.skill_level,
        ..GamePreferences::default()
      },
      ..UserProfile::default()
    };
    profile.stats.skill_level = self.skill_level;
    Ok(profile)
  }
}

/// Returns the trimmed username when it passes the length and character rules.
pub fn validate_username(raw: &str) -> Result<String, ValidationError> {
  let trimmed = raw.trim();
  let len = trimmed.chars().count();
  if len == 0 {
    return Err(ValidationError::EmptyUsername);
  }
  if len < USERNAME_MIN {
    return Err(ValidationError::UsernameTooShort);
  }
  if len > USERNAME_MAX {
    return Err(ValidationError::UsernameTooLong);
  }
  if !trimmed.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
    return Err(ValidationError::UsernameInvalidCharacters);
  }
  Ok(trimmed.to_string())
}
