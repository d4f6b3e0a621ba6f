//! Achievement rule table and evaluator.
//!
//! Each rule pairs static metadata with a predicate over the current stats and
//! the just-finished session. An achievement title is unlocked at most once.

use tracing::info;
use uuid::Uuid;

use crate::domain::{Achievement, Challenge, ChallengeType, UnlockCondition};
use crate::progression::PlayerStats;

/// What a rule can look at.
pub struct EvaluationContext<'a> {
  pub stats: &'a PlayerStats,
  /// Challenges completed in the session being folded in (empty outside game over).
  pub completed: &'a [Challenge],
  /// Set when the player just shared a score or achievement.
  pub shared: bool,
}

pub struct AchievementRule {
  pub title: &'static str,
  pub description: &'static str,
  pub icon_name: &'static str,
  pub points: u32,
  pub condition: fn() -> UnlockCondition,
  pub check: fn(&EvaluationContext) -> bool,
}

impl AchievementRule {
  fn unlock(&self) -> Achievement {
    Achievement {
      id: Uuid::new_v4(),
      title: self.title.to_string(),
      description: self.description.to_string(),
      icon_name: self.icon_name.to_string(),
      points: self.points,
      is_unlocked: true,
      unlock_condition: (self.condition)(),
    }
  }
}

pub static RULES: &[AchievementRule] = &[
  AchievementRule {
    title: "Score Master",
    description: "Reach a high score of 1000 points",
    icon_name: "star.fill",
    points: 100,
    condition: || UnlockCondition::ScoreReached(1000),
    check: |ctx| ctx.stats.high_score >= 1000,
  },
  AchievementRule {
    title: "Dedicated Player",
    description: "Play 10 games",
    icon_name: "gamecontroller.fill",
    points: 50,
    condition: || UnlockCondition::GamesPlayed(10),
    check: |ctx| ctx.stats.games_played >= 10,
  },
  AchievementRule {
    title: "Memory Master",
    description: "Complete your first memory challenge",
    icon_name: "brain.head.profile",
    points: 150,
    condition: || UnlockCondition::ChallengeCompleted,
    check: |ctx| completed_kind(ctx, ChallengeType::Memory),
  },
  AchievementRule {
    title: "Perfect Game",
    description: "Finish every challenge of a session in time and with points",
    icon_name: "checkmark.seal.fill",
    points: 200,
    condition: || UnlockCondition::PerfectGame,
    check: |ctx| !ctx.completed.is_empty() && ctx.completed.iter().all(Challenge::is_perfect),
  },
  AchievementRule {
    title: "AR Pioneer",
    description: "Complete an AR interaction challenge",
    icon_name: "arkit",
    points: 200,
    condition: || UnlockCondition::ArChallengeCompleted,
    check: |ctx| completed_kind(ctx, ChallengeType::ArInteraction),
  },
  AchievementRule {
    title: "Social Star",
    description: "Share a score or an achievement",
    icon_name: "square.and.arrow.up",
    points: 75,
    condition: || UnlockCondition::SocialShare,
    check: |ctx| ctx.shared,
  },
];

fn completed_kind(ctx: &EvaluationContext, kind: ChallengeType) -> bool {
  ctx.completed.iter().any(|c| c.is_completed && c.kind == kind)
}

/// Runs after every stats update. Appends newly unlocked achievements to
/// `stats.achievements` and returns them for the caller to surface.
pub fn evaluate(stats: &mut PlayerStats, completed: &[Challenge]) -> Vec<Achievement> {
  evaluate_with(stats, completed, false)
}

/// Same as [`evaluate`] but for a successful share.
pub fn evaluate_share(stats: &mut PlayerStats) -> Vec<Achievement> {
  evaluate_with(stats, &[], true)
}

fn evaluate_with(stats: &mut PlayerStats, completed: &[Challenge], shared: bool) -> Vec<Achievement> {
  let unlocked: Vec<Achievement> = {
    let ctx = EvaluationContext { stats, completed, shared };
    RULES
      .iter()
      .filter(|rule| !ctx.stats.has_achievement(rule.title) && (rule.check)(&ctx))
      .map(AchievementRule::unlock)
      .collect()
  };

  for a in &unlocked {
    info!(target: "progression", title = %a.title, points = a.points, "Achievement unlocked");
  }
  stats.achievements.extend(unlocked.iter().cloned());
  unlocked
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, Utc};

  fn done(kind: ChallengeType, score: u64, elapsed_secs: i64) -> Challenge {
    let mut c = Challenge::new(kind, 5, Some(120.0));
    let start = Utc::now();
    c.start_time = Some(start);
    c.end_time = Some(start + Duration::seconds(elapsed_secs));
    c.score = score;
    c.is_completed = true;
    c
  }

  fn titles(list: &[Achievement]) -> Vec<&str> {
    list.iter().map(|a| a.title.as_str()).collect()
  }

  #[test]
  fn nothing_for_a_fresh_player() {
    let mut stats = PlayerStats::default();
    assert!(evaluate(&mut stats, &[]).is_empty());
    assert!(stats.achievements.is_empty());
  }

  #[test]
  fn score_master_once() {
    let mut stats = PlayerStats::default();
    stats.update_stats(1500);
    let first = evaluate(&mut stats, &[]);
    assert_eq!(titles(&first), vec!["Score Master"]);
    assert_eq!(first[0].points, 100);
    assert!(first[0].is_unlocked);

    stats.update_stats(2000);
    assert!(evaluate(&mut stats, &[]).is_empty());
    assert_eq!(stats.achievements.iter().filter(|a| a.title == "Score Master").count(), 1);
  }

  #[test]
  fn dedicated_player_after_ten_games() {
    let mut stats = PlayerStats::default();
    for _ in 0..9 {
      stats.update_stats(1);
      assert!(evaluate(&mut stats, &[]).is_empty());
    }
    stats.update_stats(1);
    assert_eq!(titles(&evaluate(&mut stats, &[])), vec!["Dedicated Player"]);
  }

  #[test]
  fn session_based_unlocks() {
    let mut stats = PlayerStats::default();
    let session = vec![done(ChallengeType::Memory, 0, 130), done(ChallengeType::ArInteraction, 20, 30)];
    let unlocked = evaluate(&mut stats, &session);
    assert_eq!(titles(&unlocked), vec!["Memory Master", "AR Pioneer"]);

    // Re-satisfying the same conditions adds nothing.
    assert!(evaluate(&mut stats, &session).is_empty());
    assert_eq!(stats.achievements.len(), 2);
  }

  #[test]
  fn perfect_game() {
    let mut stats = PlayerStats::default();
    let session = vec![done(ChallengeType::Timing, 10, 30), done(ChallengeType::Reaction, 5, 60)];
    assert_eq!(titles(&evaluate(&mut stats, &session)), vec!["Perfect Game"]);
  }

  #[test]
  fn share_unlocks_social_star() {
    let mut stats = PlayerStats::default();
    let unlocked = evaluate_share(&mut stats);
    assert_eq!(titles(&unlocked), vec!["Social Star"]);
    assert_eq!(unlocked[0].unlock_condition, UnlockCondition::SocialShare);
    assert!(evaluate_share(&mut stats).is_empty());
  }
}
