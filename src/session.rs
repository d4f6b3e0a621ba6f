//! Game session state machine.
//!
//! ```text
//! menu -> playing <-> paused
//!   playing/paused --complete--> menu
//!   menu/playing/paused --end--> gameOver
//! ```
//!
//! Pure and synchronous: callers pass `now`, and the countdown task only
//! delivers ticks. Whether a countdown should be running is read back through
//! [`GameSession::countdown_should_run`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Challenge, GameState};
use crate::error::SessionError;

/// Seconds removed from `time_remaining` per tick.
const TICK_SECONDS: f64 = 1.0;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
  pub id: Uuid,
  pub state: GameState,
  /// Owned exclusively by the session while active.
  pub current_challenge: Option<Challenge>,
  pub session_score: u64,
  /// Append-only.
  pub challenges_completed: Vec<Challenge>,
  /// Seconds; zero when the active challenge is untimed.
  pub time_remaining: f64,
  pub created_at: DateTime<Utc>,
}

/// A challenge that just reached its terminal outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedChallenge {
  pub challenge: Challenge,
  pub final_score: u64,
  pub timed_out: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
  /// No countdown is active (paused, menu, untimed).
  Ignored,
  Ticked { time_remaining: f64 },
  TimedOut(CompletedChallenge),
}

/// What the session contributes to progression once it is over.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
  pub session_id: Uuid,
  pub session_score: u64,
  pub challenges_completed: Vec<Challenge>,
  /// Set when a challenge was still in progress and got dropped.
  pub abandoned: Option<Challenge>,
  pub duration_secs: f64,
}

impl GameSession {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4(),
      state: GameState::Menu,
      current_challenge: None,
      session_score: 0,
      challenges_completed: Vec::new(),
      time_remaining: 0.0,
      created_at: now,
    }
  }

  fn invalid(&self, action: &'static str) -> SessionError {
    SessionError::InvalidTransition { action, state: self.state }
  }

  pub fn start_challenge(&mut self, mut challenge: Challenge, now: DateTime<Utc>) -> Result<(), SessionError> {
    if self.state != GameState::Menu {
      return Err(self.invalid("start a challenge"));
    }
    challenge.start_time = Some(now);
    challenge.end_time = None;
    challenge.is_completed = false;
    challenge.score = 0;
    self.time_remaining = challenge.time_limit.unwrap_or(0.0).max(0.0);
    debug!(target: "session", kind = ?challenge.kind, difficulty = challenge.difficulty, time_limit = ?challenge.time_limit, "Challenge started");
    self.current_challenge = Some(challenge);
    self.state = GameState::Playing;
    Ok(())
  }

  /// No-op (returns `None`) when no challenge is active.
  pub fn complete_challenge(&mut self, score: u64, now: DateTime<Utc>) -> Option<CompletedChallenge> {
    self.finish(score, now, false)
  }

  fn finish(&mut self, score: u64, now: DateTime<Utc>, timed_out: bool) -> Option<CompletedChallenge> {
    let mut challenge = self.current_challenge.take()?;
    challenge.end_time = Some(now);
    challenge.score = score;
    challenge.is_completed = true;

    let final_score = challenge.final_score();
    self.session_score = self.session_score.saturating_add(final_score);
    self.challenges_completed.push(challenge.clone());
    self.time_remaining = 0.0;
    self.state = GameState::Menu;
    debug!(target: "session", kind = ?challenge.kind, score, final_score, timed_out, session_score = self.session_score, "Challenge completed");

    Some(CompletedChallenge { challenge, final_score, timed_out })
  }

  /// One countdown step. Reaching zero completes the challenge with score 0.
  pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
    if !self.countdown_should_run() {
      return TickOutcome::Ignored;
    }
    self.time_remaining = (self.time_remaining - TICK_SECONDS).max(0.0);
    if self.time_remaining > 0.0 {
      return TickOutcome::Ticked { time_remaining: self.time_remaining };
    }
    match self.finish(0, now, true) {
      Some(done) => TickOutcome::TimedOut(done),
      None => TickOutcome::Ignored,
    }
  }

  pub fn pause(&mut self) -> Result<(), SessionError> {
    if self.state != GameState::Playing {
      return Err(self.invalid("pause"));
    }
    self.state = GameState::Paused;
    Ok(())
  }

  pub fn resume(&mut self) -> Result<(), SessionError> {
    if self.state != GameState::Paused {
      return Err(self.invalid("resume"));
    }
    self.state = GameState::Playing;
    Ok(())
  }

  /// Terminal for this session instance. Any in-progress challenge is dropped
  /// without scoring.
  pub fn end(&mut self, now: DateTime<Utc>) -> Result<SessionSummary, SessionError> {
    if self.state == GameState::GameOver {
      return Err(self.invalid("end the session"));
    }
    let abandoned = self.current_challenge.take();
    self.time_remaining = 0.0;
    self.state = GameState::GameOver;
    debug!(target: "session", session_score = self.session_score, completed = self.challenges_completed.len(), abandoned = abandoned.is_some(), "Session over");

    Ok(SessionSummary {
      session_id: self.id,
      session_score: self.session_score,
      challenges_completed: self.challenges_completed.clone(),
      abandoned,
      duration_secs: (now - self.created_at).num_milliseconds().max(0) as f64 / 1000.0,
    })
  }

  /// Playing a timed challenge with time left.
  pub fn countdown_should_run(&self) -> bool {
    self.state == GameState::Playing
      && self.time_remaining > 0.0
      && self.current_challenge.as_ref().is_some_and(|c| c.time_limit.is_some())
  }

  /// A session nobody has played in yet; safe to discard.
  pub fn is_untouched(&self) -> bool {
    self.state == GameState::Menu && self.challenges_completed.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ChallengeType;
  use chrono::Duration;

  fn timed(kind: ChallengeType, limit: f64) -> Challenge {
    Challenge::new(kind, 5, Some(limit))
  }

  #[test]
  fn start_moves_to_playing() {
    let now = Utc::now();
    let mut s = GameSession::new(now);
    s.start_challenge(timed(ChallengeType::Timing, 100.0), now).unwrap();
    assert_eq!(s.state, GameState::Playing);
    assert_eq!(s.time_remaining, 100.0);
    assert_eq!(s.current_challenge.as_ref().unwrap().start_time, Some(now));
    assert!(s.countdown_should_run());
  }

  #[test]
  fn start_only_from_menu() {
    let now = Utc::now();
    let mut s = GameSession::new(now);
    s.start_challenge(timed(ChallengeType::Timing, 100.0), now).unwrap();
    let err = s.start_challenge(timed(ChallengeType::Memory, 100.0), now).unwrap_err();
    assert_eq!(err, SessionError::InvalidTransition { action: "start a challenge", state: GameState::Playing });
    assert_eq!(s.current_challenge.as_ref().unwrap().kind, ChallengeType::Timing);
  }

  #[test]
  fn complete_scores_and_returns_to_menu() {
    let start = Utc::now();
    let mut s = GameSession::new(start);
    s.start_challenge(timed(ChallengeType::Timing, 100.0), start).unwrap();
    let done = s.complete_challenge(0, start + Duration::seconds(90)).unwrap();
    assert_eq!(done.final_score, 600);
    assert!(!done.timed_out);
    assert!(done.challenge.is_completed);
    assert_eq!(s.state, GameState::Menu);
    assert_eq!(s.session_score, 600);
    assert_eq!(s.challenges_completed.len(), 1);
    assert!(s.current_challenge.is_none());
    assert!(!s.countdown_should_run());
  }

  #[test]
  fn complete_without_challenge_is_noop() {
    let now = Utc::now();
    let mut s = GameSession::new(now);
    assert!(s.complete_challenge(50, now).is_none());
    assert_eq!(s.state, GameState::Menu);
    assert_eq!(s.session_score, 0);
    assert!(s.challenges_completed.is_empty());
  }

  #[test]
  fn ticking_to_zero_forces_zero_score_completion() {
    let start = Utc::now();
    let mut s = GameSession::new(start);
    s.start_challenge(timed(ChallengeType::Reaction, 60.0), start).unwrap();
    for i in 1..60 {
      assert_eq!(s.tick(start + Duration::seconds(i)), TickOutcome::Ticked { time_remaining: (60 - i) as f64 });
    }
    match s.tick(start + Duration::seconds(60)) {
      TickOutcome::TimedOut(done) => {
        assert!(done.timed_out);
        assert_eq!(done.challenge.score, 0);
        assert!(done.challenge.is_completed);
        assert_eq!(done.final_score, 80 * 5);
      }
      other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(s.state, GameState::Menu);
    assert_eq!(s.tick(start + Duration::seconds(61)), TickOutcome::Ignored);
  }

  #[test]
  fn fractional_limit_times_out_on_the_next_whole_tick() {
    let start = Utc::now();
    let mut s = GameSession::new(start);
    s.start_challenge(timed(ChallengeType::Memory, 2.5), start).unwrap();
    assert!(matches!(s.tick(start), TickOutcome::Ticked { .. }));
    assert!(matches!(s.tick(start), TickOutcome::Ticked { .. }));
    assert!(matches!(s.tick(start), TickOutcome::TimedOut(_)));
  }

  #[test]
  fn pause_resume_preserves_time() {
    let now = Utc::now();
    let mut s = GameSession::new(now);
    s.start_challenge(timed(ChallengeType::Strategy, 10.0), now).unwrap();
    s.tick(now);
    s.tick(now);
    s.pause().unwrap();
    assert_eq!(s.state, GameState::Paused);
    assert!(!s.countdown_should_run());
    assert_eq!(s.tick(now), TickOutcome::Ignored);
    assert_eq!(s.time_remaining, 8.0);

    s.resume().unwrap();
    assert_eq!(s.time_remaining, 8.0);
    assert!(s.countdown_should_run());
  }

  #[test]
  fn pause_and_resume_guards() {
    let now = Utc::now();
    let mut s = GameSession::new(now);
    assert!(s.pause().is_err());
    assert!(s.resume().is_err());
    s.start_challenge(timed(ChallengeType::Strategy, 10.0), now).unwrap();
    assert!(s.resume().is_err());
    s.pause().unwrap();
    assert!(s.pause().is_err());
  }

  #[test]
  fn complete_while_paused() {
    let now = Utc::now();
    let mut s = GameSession::new(now);
    s.start_challenge(Challenge::new(ChallengeType::Strategy, 5, None), now).unwrap();
    assert!(!s.countdown_should_run());
    s.pause().unwrap();
    let done = s.complete_challenge(25, now).unwrap();
    assert_eq!(done.final_score, 150 * 5 + 25);
    assert_eq!(s.state, GameState::Menu);
  }

  #[test]
  fn end_session_is_terminal() {
    let start = Utc::now();
    let mut s = GameSession::new(start);
    s.start_challenge(timed(ChallengeType::Timing, 100.0), start).unwrap();
    s.complete_challenge(10, start).unwrap();
    s.start_challenge(timed(ChallengeType::Memory, 100.0), start).unwrap();

    let summary = s.end(start + Duration::seconds(30)).unwrap();
    assert_eq!(s.state, GameState::GameOver);
    assert_eq!(summary.challenges_completed.len(), 1);
    assert_eq!(summary.abandoned.map(|c| c.kind), Some(ChallengeType::Memory));
    assert_eq!(summary.session_score, s.session_score);
    assert_eq!(summary.duration_secs, 30.0);
    assert!(!s.countdown_should_run());

    assert!(s.end(start).is_err());
    assert!(s.start_challenge(timed(ChallengeType::Timing, 100.0), start).is_err());
    assert!(s.complete_challenge(10, start).is_none());
  }
}
