//! Challenge catalog: one challenge definition per kind, scaled by skill level.
//! Regenerated whenever the preferred skill level changes; nothing is persisted.

use std::collections::BTreeMap;

use crate::domain::{Challenge, ChallengeType, SkillLevel};

/// Difficulty for the beginner tier; scaled by the skill multiplier.
const BASE_DIFFICULTY: f64 = 5.0;
/// Seconds allowed at the beginner tier; divided by the skill multiplier.
const BASE_TIME_LIMIT: f64 = 120.0;

#[derive(Clone, Debug)]
pub struct ChallengeCatalog {
  skill_level: SkillLevel,
  challenges: BTreeMap<ChallengeType, Challenge>,
}

impl ChallengeCatalog {
  pub fn generate(skill_level: SkillLevel) -> Self {
    let m = skill_level.difficulty_multiplier();
    let difficulty = ((BASE_DIFFICULTY * m).floor() as u32).clamp(1, 10);
    let time_limit = BASE_TIME_LIMIT / m;

    let challenges = ChallengeType::ALL
      .iter()
      .map(|&kind| (kind, Challenge::new(kind, difficulty, Some(time_limit))))
      .collect();

    Self { skill_level, challenges }
  }

  pub fn skill_level(&self) -> SkillLevel {
    self.skill_level
  }

  pub fn get(&self, kind: ChallengeType) -> Option<&Challenge> {
    self.challenges.get(&kind)
  }

  /// A fresh playable copy of the definition, with its own id.
  pub fn instantiate(&self, kind: ChallengeType) -> Option<Challenge> {
    self
      .get(kind)
      .map(|c| Challenge::new(c.kind, c.difficulty, c.time_limit))
  }

  pub fn challenges(&self) -> Vec<Challenge> {
    self.challenges.values().cloned().collect()
  }
}
