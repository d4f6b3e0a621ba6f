//! Durable cross-session player statistics: score totals, high score,
//! experience and level.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Achievement, SkillLevel};

/// Experience earned per point scored.
const POINTS_PER_XP: u64 = 10;
/// Experience needed per level.
const XP_PER_LEVEL: u64 = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
  #[serde(default)]
  pub total_score: u64,
  #[serde(default)]
  pub high_score: u64,
  #[serde(default)]
  pub games_played: u32,
  #[serde(default = "first_level")]
  pub level: u32,
  #[serde(default)]
  pub experience: u64,
  #[serde(default)]
  pub skill_level: SkillLevel,
  /// Append-only; at most one entry per title.
  #[serde(default)]
  pub achievements: Vec<Achievement>,
}

fn first_level() -> u32 {
  1
}

impl Default for PlayerStats {
  fn default() -> Self {
    Self {
      total_score: 0,
      high_score: 0,
      games_played: 0,
      level: first_level(),
      experience: 0,
      skill_level: SkillLevel::default(),
      achievements: Vec::new(),
    }
  }
}

/// Returned by [`PlayerStats::update_stats`] when the level went up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelUp {
  pub old_level: u32,
  pub new_level: u32,
}

impl PlayerStats {
  /// Always derived from the totals so it cannot drift.
  pub fn average_score(&self) -> f64 {
    if self.games_played == 0 {
      0.0
    } else {
      self.total_score as f64 / f64::from(self.games_played)
    }
  }

  /// Folds one finished session into the totals.
  ///
  /// Callers invoke this exactly once per session; a second call for the same
  /// session double-counts.
  pub fn update_stats(&mut self, new_score: u64) -> Option<LevelUp> {
    self.total_score = self.total_score.saturating_add(new_score);
    self.games_played = self.games_played.saturating_add(1);
    self.high_score = self.high_score.max(new_score);
    self.experience = self.experience.saturating_add(new_score / POINTS_PER_XP);

    let old_level = self.level;
    let candidate = u32::try_from(self.experience / XP_PER_LEVEL + 1).unwrap_or(u32::MAX);
    if candidate > self.level {
      self.level = candidate;
    }
    debug!(target: "progression", new_score, total = self.total_score, high = self.high_score, level = self.level, "Stats updated");

    (self.level > old_level).then_some(LevelUp { old_level, new_level: self.level })
  }

  pub fn has_achievement(&self, title: &str) -> bool {
    self.achievements.iter().any(|a| a.title == title)
  }

  /// Progress through the current level, 0.0..1.0.
  pub fn level_progress(&self) -> f64 {
    (self.experience % XP_PER_LEVEL) as f64 / XP_PER_LEVEL as f64
  }
}
