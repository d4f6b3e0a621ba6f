//! Domain models: skill tiers, challenge kinds, challenges, achievements,
//! leaderboard rows, session history and the events the controller publishes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Player-selected difficulty tier.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SkillLevel {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
  Expert,
}

impl SkillLevel {
  pub const ALL: [SkillLevel; 4] = [
    SkillLevel::Beginner,
    SkillLevel::Intermediate,
    SkillLevel::Advanced,
    SkillLevel::Expert,
  ];

  /// Scales challenge difficulty up and time limits down.
  pub fn difficulty_multiplier(&self) -> f64 {
    match self {
      SkillLevel::Beginner => 1.0,
      SkillLevel::Intermediate => 1.3,
      SkillLevel::Advanced => 1.6,
      SkillLevel::Expert => 2.0,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      SkillLevel::Beginner => "Beginner",
      SkillLevel::Intermediate => "Intermediate",
      SkillLevel::Advanced => "Advanced",
      SkillLevel::Expert => "Expert",
    }
  }

  pub fn description(&self) -> &'static str {
    match self {
      SkillLevel::Beginner => "Perfect for newcomers to sports gaming",
      SkillLevel::Intermediate => "For players with some gaming experience",
      SkillLevel::Advanced => "Challenging gameplay for experienced players",
      SkillLevel::Expert => "Maximum difficulty for gaming masters",
    }
  }
}

/// The five mini-game kinds. Immutable catalog data.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeType {
  Timing,
  Strategy,
  Reaction,
  Memory,
  ArInteraction,
}

impl ChallengeType {
  pub const ALL: [ChallengeType; 5] = [
    ChallengeType::Timing,
    ChallengeType::Strategy,
    ChallengeType::Reaction,
    ChallengeType::Memory,
    ChallengeType::ArInteraction,
  ];

  pub fn base_points(&self) -> u64 {
    match self {
      ChallengeType::Timing => 100,
      ChallengeType::Strategy => 150,
      ChallengeType::Reaction => 80,
      ChallengeType::Memory => 120,
      ChallengeType::ArInteraction => 200,
    }
  }

  pub fn title(&self) -> &'static str {
    match self {
      ChallengeType::Timing => "Timing Challenge",
      ChallengeType::Strategy => "Strategy Puzzle",
      ChallengeType::Reaction => "Reaction Test",
      ChallengeType::Memory => "Memory Game",
      ChallengeType::ArInteraction => "AR Interaction",
    }
  }

  pub fn description(&self) -> &'static str {
    match self {
      ChallengeType::Timing => "Test your precision timing skills",
      ChallengeType::Strategy => "Solve complex sports-themed puzzles",
      ChallengeType::Reaction => "Quick reflexes determine success",
      ChallengeType::Memory => "Remember patterns and sequences",
      ChallengeType::ArInteraction => "Interactive augmented reality challenges",
    }
  }
}

/// One timed or untimed mini-game instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
  pub id: Uuid,
  #[serde(rename = "type")]
  pub kind: ChallengeType,
  /// 1..=10
  pub difficulty: u32,
  /// Seconds.
  #[serde(default)]
  pub time_limit: Option<f64>,
  #[serde(default)]
  pub is_completed: bool,
  #[serde(default)]
  pub score: u64,
  #[serde(default)]
  pub start_time: Option<DateTime<Utc>>,
  #[serde(default)]
  pub end_time: Option<DateTime<Utc>>,
}

impl Challenge {
  pub fn new(kind: ChallengeType, difficulty: u32, time_limit: Option<f64>) -> Self {
    Self {
      id: Uuid::new_v4(),
      kind,
      difficulty,
      time_limit,
      is_completed: false,
      score: 0,
      start_time: None,
      end_time: None,
    }
  }

  /// Seconds between start and end, when both are known.
  pub fn completion_time(&self) -> Option<f64> {
    match (self.start_time, self.end_time) {
      (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
      _ => None,
    }
  }

  /// Ten points per second left on the clock; zero for untimed or unfinished challenges.
  pub fn time_bonus(&self) -> u64 {
    match (self.time_limit, self.completion_time()) {
      (Some(limit), Some(elapsed)) => ((limit - elapsed) * 10.0).floor().max(0.0) as u64,
      _ => 0,
    }
  }

  pub fn final_score(&self) -> u64 {
    self.kind.base_points() * u64::from(self.difficulty) + self.time_bonus() + self.score
  }

  /// Finished with points before the clock ran out.
  pub fn is_perfect(&self) -> bool {
    if !self.is_completed || self.score == 0 {
      return false;
    }
    match (self.time_limit, self.completion_time()) {
      (Some(limit), Some(elapsed)) => elapsed < limit,
      (Some(_), None) => false,
      (None, _) => true,
    }
  }
}

/// Overall state of a play session.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum GameState {
  #[default]
  Menu,
  Playing,
  Paused,
  GameOver,
}

impl fmt::Display for GameState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      GameState::Menu => "menu",
      GameState::Playing => "playing",
      GameState::Paused => "paused",
      GameState::GameOver => "game over",
    };
    f.write_str(s)
  }
}

/// How an achievement is earned.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum UnlockCondition {
  ScoreReached(u64),
  GamesPlayed(u32),
  PerfectGame,
  ArChallengeCompleted,
  SocialShare,
  ChallengeCompleted,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub icon_name: String,
  pub points: u32,
  pub is_unlocked: bool,
  pub unlock_condition: UnlockCondition,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
  pub username: String,
  pub score: u64,
  pub rank: u32,
  pub date: DateTime<Utc>,
  #[serde(default)]
  pub challenge_type: Option<ChallengeType>,
}

/// One finished session as kept in the persisted history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub id: Uuid,
  pub session_id: Uuid,
  pub date: DateTime<Utc>,
  pub total_score: u64,
  pub challenges_completed: Vec<Challenge>,
  /// Seconds from session creation to game over.
  pub duration: f64,
}

/// Notifications published by the controller (WebSocket clients receive them verbatim).
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
  StateChanged {
    state: GameState,
  },
  Tick {
    #[serde(rename = "timeRemaining")]
    time_remaining: f64,
  },
  ChallengeCompleted {
    challenge: Challenge,
    #[serde(rename = "finalScore")]
    final_score: u64,
    #[serde(rename = "timedOut")]
    timed_out: bool,
  },
  GameOver {
    #[serde(rename = "sessionScore")]
    session_score: u64,
    #[serde(rename = "challengesCompleted")]
    challenges_completed: usize,
  },
  LevelUp {
    #[serde(rename = "oldLevel")]
    old_level: u32,
    #[serde(rename = "newLevel")]
    new_level: u32,
  },
  AchievementsUnlocked {
    achievements: Vec<Achievement>,
  },
  ScoreSubmitted {
    score: u64,
  },
  /// Non-fatal failure to surface as a dismissible message.
  Notice {
    message: String,
  },
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn finished(kind: ChallengeType, difficulty: u32, limit: Option<f64>, elapsed_ms: i64, score: u64) -> Challenge {
    let start = Utc::now();
    let mut c = Challenge::new(kind, difficulty, limit);
    c.start_time = Some(start);
    c.end_time = Some(start + Duration::milliseconds(elapsed_ms));
    c.score = score;
    c.is_completed = true;
    c
  }

  #[test]
  fn final_score_includes_time_bonus() {
    let c = finished(ChallengeType::Timing, 5, Some(100.0), 90_000, 0);
    assert_eq!(c.completion_time(), Some(90.0));
    assert_eq!(c.time_bonus(), 100);
    assert_eq!(c.final_score(), 600);
  }

  #[test]
  fn time_bonus_never_negative() {
    let c = finished(ChallengeType::Memory, 6, Some(60.0), 75_000, 40);
    assert_eq!(c.time_bonus(), 0);
    assert_eq!(c.final_score(), 120 * 6 + 40);
  }

  #[test]
  fn untimed_or_unfinished_has_no_bonus() {
    let untimed = finished(ChallengeType::Reaction, 5, None, 1_000, 10);
    assert_eq!(untimed.final_score(), 80 * 5 + 10);

    let mut unfinished = Challenge::new(ChallengeType::Strategy, 5, Some(120.0));
    unfinished.start_time = Some(Utc::now());
    assert_eq!(unfinished.completion_time(), None);
    assert_eq!(unfinished.final_score(), 750);
  }

  #[test]
  fn fractional_remaining_time_is_floored() {
    let c = finished(ChallengeType::ArInteraction, 10, Some(60.0), 59_950, 0);
    assert_eq!(c.time_bonus(), 0);
    let c = finished(ChallengeType::ArInteraction, 10, Some(60.0), 59_850, 0);
    assert_eq!(c.time_bonus(), 1);
  }

  #[test]
  fn perfect_requires_points_within_limit() {
    assert!(finished(ChallengeType::Timing, 5, Some(100.0), 10_000, 50).is_perfect());
    assert!(!finished(ChallengeType::Timing, 5, Some(100.0), 10_000, 0).is_perfect());
    assert!(!finished(ChallengeType::Timing, 5, Some(100.0), 100_000, 50).is_perfect());
  }

  #[test]
  fn multipliers_and_base_points() {
    let m: Vec<f64> = SkillLevel::ALL.iter().map(|s| s.difficulty_multiplier()).collect();
    assert_eq!(m, vec![1.0, 1.3, 1.6, 2.0]);
    let p: Vec<u64> = ChallengeType::ALL.iter().map(|c| c.base_points()).collect();
    assert_eq!(p, vec![100, 150, 80, 120, 200]);
  }

  #[test]
  fn unlock_condition_serializes_as_tagged_variant() {
    let json = serde_json::to_value(UnlockCondition::ScoreReached(1000)).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "scoreReached", "value": 1000 }));
    let json = serde_json::to_value(UnlockCondition::PerfectGame).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "perfectGame" }));
    let back: UnlockCondition = serde_json::from_value(json).unwrap();
    assert_eq!(back, UnlockCondition::PerfectGame);
  }
}
