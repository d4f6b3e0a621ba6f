//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::controller::{CompleteOutcome, GameOverReport, ShareOutcome, SubmitOutcome};
use crate::domain::{Achievement, Challenge, ChallengeType, GameEvent, HistoryEntry, LeaderboardEntry, SkillLevel};
use crate::profile::{GamePreferences, OnboardingRequest, UserProfile};
use crate::progression::PlayerStats;
use crate::session::GameSession;
use crate::util::{format_score, format_time};

/// Messages the client can send over WebSocket. Mirrors the HTTP surface.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  GetProfile,
  GetOnboarding,
  CompleteOnboarding {
    username: String,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default, rename = "skillLevel")]
    skill_level: SkillLevel,
    #[serde(default, rename = "notificationsGranted")]
    notifications_granted: bool,
  },
  UpdateUsername {
    username: String,
  },
  UpdateSkillLevel {
    #[serde(rename = "skillLevel")]
    skill_level: SkillLevel,
  },
  UpdatePreferences {
    preferences: GamePreferences,
  },
  GetSkillLevels,
  GetChallenges,
  GetAchievements,
  GetSession,
  StartChallenge {
    #[serde(rename = "challengeType")]
    challenge_type: ChallengeType,
  },
  CompleteChallenge {
    score: u64,
  },
  Pause,
  Resume,
  EndSession,
  ReturnToMenu,
  SubmitScore,
  Leaderboard {
    #[serde(default)]
    limit: Option<usize>,
  },
  ShareScore {
    score: u64,
    #[serde(default, rename = "challengeType")]
    challenge_type: Option<ChallengeType>,
  },
  ShareAchievement {
    title: String,
  },
  GetConnectivity,
  SetConnectivity {
    online: bool,
  },
  GetHistory,
  GetDataSize,
  ExportData,
  /// `data` is a document previously produced by `export_data`.
  ImportData {
    data: serde_json::Value,
  },
  BackupData,
  RestoreData,
  ResetData,
}

/// Messages the server sends over WebSocket: replies plus streamed controller events.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Profile {
    profile: ProfileOut,
  },
  Onboarding {
    completed: bool,
  },
  SkillLevels {
    levels: Vec<SkillLevelOut>,
  },
  Challenges {
    challenges: Vec<ChallengeOut>,
  },
  Achievements {
    achievements: Vec<Achievement>,
  },
  Session {
    session: SessionOut,
  },
  ChallengeResult {
    outcome: CompleteOutcome,
  },
  GameOverReport {
    report: GameOverOut,
  },
  Leaderboard {
    entries: Vec<LeaderboardEntry>,
  },
  Submitted {
    outcome: SubmitOutcome,
  },
  Shared {
    outcome: ShareOutcome,
  },
  Connectivity {
    online: bool,
  },
  History {
    entries: Vec<HistoryEntry>,
  },
  DataSize {
    bytes: u64,
  },
  Exported {
    data: serde_json::Value,
  },
  /// Acknowledges backup and reset.
  Done,
  Event {
    event: GameEvent,
  },
  Error {
    message: String,
  },
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

/// Player stats with the derived values the UI shows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOut {
  #[serde(flatten)]
  pub stats: PlayerStats,
  pub average_score: f64,
  pub level_progress: f64,
  pub formatted_high_score: String,
}

impl From<PlayerStats> for StatsOut {
  fn from(stats: PlayerStats) -> Self {
    Self {
      average_score: stats.average_score(),
      level_progress: stats.level_progress(),
      formatted_high_score: format_score(stats.high_score),
      stats,
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOut {
  pub id: Uuid,
  pub username: String,
  pub avatar: String,
  pub stats: StatsOut,
  pub preferences: GamePreferences,
  pub created_at: DateTime<Utc>,
  pub last_played_at: DateTime<Utc>,
}

impl From<UserProfile> for ProfileOut {
  fn from(p: UserProfile) -> Self {
    Self {
      id: p.id,
      username: p.username,
      avatar: p.avatar,
      stats: p.stats.into(),
      preferences: p.preferences,
      created_at: p.created_at,
      last_played_at: p.last_played_at,
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
  #[serde(flatten)]
  pub session: GameSession,
  pub formatted_time: String,
}

impl From<GameSession> for SessionOut {
  fn from(session: GameSession) -> Self {
    Self { formatted_time: format_time(session.time_remaining), session }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverOut {
  pub session_score: u64,
  pub challenges_completed: usize,
  pub level_up: Option<u32>,
  pub unlocked: Vec<Achievement>,
  pub auto_submitted: bool,
  pub profile: ProfileOut,
}

impl From<GameOverReport> for GameOverOut {
  fn from(r: GameOverReport) -> Self {
    Self {
      session_score: r.session_score,
      challenges_completed: r.challenges_completed,
      level_up: r.level_up,
      unlocked: r.unlocked,
      auto_submitted: r.auto_submitted,
      profile: r.profile.into(),
    }
  }
}

/// Catalog entry with display text.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOut {
  #[serde(flatten)]
  pub challenge: Challenge,
  pub title: &'static str,
  pub description: &'static str,
  pub base_points: u64,
}

impl From<Challenge> for ChallengeOut {
  fn from(challenge: Challenge) -> Self {
    Self {
      title: challenge.kind.title(),
      description: challenge.kind.description(),
      base_points: challenge.kind.base_points(),
      challenge,
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillLevelOut {
  pub level: SkillLevel,
  pub label: &'static str,
  pub description: &'static str,
  pub difficulty_multiplier: f64,
}

impl From<SkillLevel> for SkillLevelOut {
  fn from(level: SkillLevel) -> Self {
    Self {
      level,
      label: level.label(),
      description: level.description(),
      difficulty_multiplier: level.difficulty_multiplier(),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct OnboardingStatusOut {
  pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryOut {
  pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSizeOut {
  pub bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct OkOut {
  pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectivityOut {
  pub online: bool,
}

// ---- request bodies ----

pub type OnboardingIn = OnboardingRequest;

#[derive(Debug, Deserialize)]
pub struct UsernameIn {
  pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillIn {
  pub skill_level: SkillLevel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartIn {
  pub challenge_type: ChallengeType,
}

#[derive(Debug, Deserialize)]
pub struct CompleteIn {
  pub score: u64,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
  pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityIn {
  pub online: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareScoreIn {
  pub score: u64,
  #[serde(default)]
  pub challenge_type: Option<ChallengeType>,
}

#[derive(Debug, Deserialize)]
pub struct ShareAchievementIn {
  pub title: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_messages_parse() {
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"start_challenge","challengeType":"arInteraction"}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::StartChallenge { challenge_type: ChallengeType::ArInteraction }));

    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"leaderboard"}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::Leaderboard { limit: None }));

    assert!(serde_json::from_str::<ClientWsMessage>(r#"{"type":"complete_challenge"}"#).is_err());

    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"complete_onboarding","username":"Rookie","skillLevel":"advanced"}"#).unwrap();
    match m {
      ClientWsMessage::CompleteOnboarding { username, avatar, skill_level, notifications_granted } => {
        assert_eq!(username, "Rookie");
        assert_eq!(avatar, None);
        assert_eq!(skill_level, SkillLevel::Advanced);
        assert!(!notifications_granted);
      }
      other => panic!("unexpected {other:?}"),
    }

    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"set_connectivity","online":false}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::SetConnectivity { online: false }));
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"import_data","data":{"version":"1.0"}}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::ImportData { .. }));
  }

  #[test]
  fn profile_out_carries_derived_stats() {
    let mut profile = UserProfile { username: "Ace".into(), ..UserProfile::default() };
    profile.stats.update_stats(1500);
    profile.stats.update_stats(500);
    let json = serde_json::to_value(ProfileOut::from(profile)).unwrap();
    assert_eq!(json["stats"]["averageScore"], 1000.0);
    assert_eq!(json["stats"]["highScore"], 1500);
    assert_eq!(json["stats"]["formattedHighScore"], "1.5K");
    assert_eq!(json["stats"]["level"], 3);
  }

  #[test]
  fn events_are_wrapped() {
    let msg = ServerWsMessage::Event { event: GameEvent::Tick { time_remaining: 42.0 } };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "event");
    assert_eq!(json["event"]["type"], "tick");
    assert_eq!(json["event"]["timeRemaining"], 42.0);
  }
}
