//! Single-writer game controller.
//!
//! One task owns the [`UserProfile`], the current [`GameSession`], the
//! [`ChallengeCatalog`] and the running [`Countdown`]. Everything that mutates
//! them arrives as a [`Command`] on one queue and is applied in order, so the
//! stats invariants never see concurrent writers. Stored-data reads (history,
//! export, data size, onboarding flag) also go through the queue, so they
//! observe every write issued before them. Leaderboard fetches bypass it.
//!
//! Profile saves, history appends and leaderboard submissions never block
//! gameplay; their failures come back as [`GameEvent::Notice`].

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;
use tokio::{
  sync::{broadcast, mpsc, oneshot},
  task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::achievements;
use crate::catalog::ChallengeCatalog;
use crate::countdown::Countdown;
use crate::domain::{Achievement, Challenge, ChallengeType, GameEvent, GameState, HistoryEntry, LeaderboardEntry, SkillLevel};
use crate::error::{AppError, SessionError};
use crate::leaderboard::LeaderboardGateway;
use crate::persistence::PersistenceGateway;
use crate::profile::{validate_username, GamePreferences, OnboardingRequest, UserProfile};
use crate::progression::LevelUp;
use crate::session::{CompletedChallenge, GameSession, TickOutcome};
use crate::writer::PersistenceWriter;

/// Entries returned after a manual submission.
const SUBMIT_REFRESH_TOP: usize = 10;
const COMMAND_QUEUE: usize = 64;
const EVENT_BUFFER: usize = 256;

#[derive(Clone, Debug)]
pub struct ControllerSettings {
  /// Length of one countdown step.
  pub tick: Duration,
  /// Submit the session score after game over when it is a new high score.
  pub auto_submit: bool,
  /// Also auto-submit when the session score only ties the previous high score.
  pub submit_on_tie: bool,
}

impl Default for ControllerSettings {
  fn default() -> Self {
    Self { tick: Duration::from_secs(1), auto_submit: true, submit_on_tie: true }
  }
}

/// Consistent view of the controller-owned state.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
  pub profile: UserProfile,
  pub session: GameSession,
  pub challenges: Vec<Challenge>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOutcome {
  /// `None` when there was no active challenge.
  pub final_score: Option<u64>,
  pub session: GameSession,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverReport {
  pub session_score: u64,
  pub challenges_completed: usize,
  pub level_up: Option<u32>,
  pub unlocked: Vec<Achievement>,
  pub auto_submitted: bool,
  pub profile: UserProfile,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
  /// Score sent, or `None` when there was no high score to send.
  pub submitted: Option<u64>,
  pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOutcome {
  pub url: String,
  pub unlocked: Vec<Achievement>,
}

type Reply<T> = oneshot::Sender<Result<T, AppError>>;

enum Command {
  Snapshot { reply: Reply<GameSnapshot> },
  CompleteOnboarding { request: OnboardingRequest, reply: Reply<UserProfile> },
  UpdateUsername { username: String, reply: Reply<UserProfile> },
  UpdateSkillLevel { level: SkillLevel, reply: Reply<UserProfile> },
  UpdatePreferences { preferences: GamePreferences, reply: Reply<UserProfile> },
  StartChallenge { kind: ChallengeType, reply: Reply<GameSession> },
  CompleteChallenge { score: u64, reply: Reply<CompleteOutcome> },
  Pause { reply: Reply<GameSession> },
  Resume { reply: Reply<GameSession> },
  EndSession { reply: Reply<GameOverReport> },
  NewSession { reply: Reply<GameSession> },
  Tick { generation: u64 },
  ScoreEntry { reply: Reply<Option<LeaderboardEntry>> },
  RecordShare { reply: Reply<Vec<Achievement>> },
  FindAchievement { title: String, reply: Reply<Achievement> },
  Import { blob: Vec<u8>, reply: Reply<UserProfile> },
  Restore { reply: Reply<UserProfile> },
  Backup { reply: Reply<()> },
  Reset { reply: Reply<()> },
  History { reply: Reply<Vec<HistoryEntry>> },
  Export { reply: Reply<Vec<u8>> },
  DataSize { reply: Reply<u64> },
  OnboardingStatus { reply: Reply<bool> },
  Shutdown,
}

/// Cloneable handle used by the HTTP and WebSocket layers.
#[derive(Clone)]
pub struct GameController {
  commands: mpsc::Sender<Command>,
  events: broadcast::Sender<GameEvent>,
  leaderboard: Arc<dyn LeaderboardGateway>,
}

impl GameController {
  /// Spawns the controller task. The returned handle resolves once the
  /// controller has stopped and every queued write has been flushed.
  pub fn spawn(
    profile: UserProfile,
    store: Arc<dyn PersistenceGateway>,
    leaderboard: Arc<dyn LeaderboardGateway>,
    settings: ControllerSettings,
  ) -> (Self, JoinHandle<()>) {
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
    let (writer, writer_task) = PersistenceWriter::spawn(store, events.clone());

    let now = Utc::now();
    let core = Core {
      catalog: ChallengeCatalog::generate(profile.preferences.preferred_skill_level),
      profile,
      session: GameSession::new(now),
      countdown: None,
      next_generation: 0,
      settings,
      ticks: commands.downgrade(),
      events: events.clone(),
      writer,
      leaderboard: leaderboard.clone(),
    };
    let task = tokio::spawn(core.run(rx, writer_task));

    (Self { commands, events, leaderboard }, task)
  }

  pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
    self.events.subscribe()
  }

  async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, AppError> {
    let (tx, rx) = oneshot::channel();
    self.commands.send(make(tx)).await.map_err(|_| AppError::Unavailable)?;
    rx.await.map_err(|_| AppError::Unavailable)?
  }

  pub async fn snapshot(&self) -> Result<GameSnapshot, AppError> {
    self.request(|reply| Command::Snapshot { reply }).await
  }

  pub async fn profile(&self) -> Result<UserProfile, AppError> {
    Ok(self.snapshot().await?.profile)
  }

  pub async fn session(&self) -> Result<GameSession, AppError> {
    Ok(self.snapshot().await?.session)
  }

  pub async fn challenges(&self) -> Result<Vec<Challenge>, AppError> {
    Ok(self.snapshot().await?.challenges)
  }

  pub async fn achievements(&self) -> Result<Vec<Achievement>, AppError> {
    Ok(self.snapshot().await?.profile.stats.achievements)
  }

  pub async fn onboarding_status(&self) -> Result<bool, AppError> {
    self.request(|reply| Command::OnboardingStatus { reply }).await
  }

  pub async fn complete_onboarding(&self, request: OnboardingRequest) -> Result<UserProfile, AppError> {
    self.request(|reply| Command::CompleteOnboarding { request, reply }).await
  }

  pub async fn update_username(&self, username: String) -> Result<UserProfile, AppError> {
    self.request(|reply| Command::UpdateUsername { username, reply }).await
  }

  pub async fn update_skill_level(&self, level: SkillLevel) -> Result<UserProfile, AppError> {
    self.request(|reply| Command::UpdateSkillLevel { level, reply }).await
  }

  pub async fn update_preferences(&self, preferences: GamePreferences) -> Result<UserProfile, AppError> {
    self.request(|reply| Command::UpdatePreferences { preferences, reply }).await
  }

  pub async fn start_challenge(&self, kind: ChallengeType) -> Result<GameSession, AppError> {
    self.request(|reply| Command::StartChallenge { kind, reply }).await
  }

  pub async fn complete_challenge(&self, score: u64) -> Result<CompleteOutcome, AppError> {
    self.request(|reply| Command::CompleteChallenge { score, reply }).await
  }

  pub async fn pause(&self) -> Result<GameSession, AppError> {
    self.request(|reply| Command::Pause { reply }).await
  }

  pub async fn resume(&self) -> Result<GameSession, AppError> {
    self.request(|reply| Command::Resume { reply }).await
  }

  pub async fn end_session(&self) -> Result<GameOverReport, AppError> {
    self.request(|reply| Command::EndSession { reply }).await
  }

  /// Back to the menu with a fresh session.
  pub async fn new_session(&self) -> Result<GameSession, AppError> {
    self.request(|reply| Command::NewSession { reply }).await
  }

  pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError> {
    Ok(self.leaderboard.fetch_top(limit).await?)
  }

  /// Submits the profile's high score, then returns the refreshed top list.
  #[instrument(level = "info", skip(self))]
  pub async fn submit_score(&self) -> Result<SubmitOutcome, AppError> {
    let entry = self.request(|reply| Command::ScoreEntry { reply }).await?;
    let submitted = match entry {
      Some(entry) => {
        let score = entry.score;
        self.leaderboard.submit_score(entry).await?;
        let _ = self.events.send(GameEvent::ScoreSubmitted { score });
        Some(score)
      }
      None => {
        debug!(target: "leaderboard", "No high score to submit");
        None
      }
    };
    let leaderboard = self.leaderboard.fetch_top(SUBMIT_REFRESH_TOP).await?;
    Ok(SubmitOutcome { submitted, leaderboard })
  }

  pub fn set_online(&self, online: bool) {
    self.leaderboard.set_online(online);
  }

  pub fn is_online(&self) -> bool {
    self.leaderboard.is_online()
  }

  pub async fn share_score(&self, score: u64, challenge_type: Option<ChallengeType>) -> Result<ShareOutcome, AppError> {
    let url = self.leaderboard.share_score(score, challenge_type).await?;
    let unlocked = self.request(|reply| Command::RecordShare { reply }).await?;
    Ok(ShareOutcome { url, unlocked })
  }

  /// Shares one of the player's unlocked achievements by title.
  pub async fn share_achievement(&self, title: String) -> Result<ShareOutcome, AppError> {
    let achievement = self.request(|reply| Command::FindAchievement { title, reply }).await?;
    let url = self.leaderboard.share_achievement(&achievement).await?;
    let unlocked = self.request(|reply| Command::RecordShare { reply }).await?;
    Ok(ShareOutcome { url, unlocked })
  }

  pub async fn history(&self) -> Result<Vec<HistoryEntry>, AppError> {
    self.request(|reply| Command::History { reply }).await
  }

  pub async fn export(&self) -> Result<Vec<u8>, AppError> {
    self.request(|reply| Command::Export { reply }).await
  }

  pub async fn data_size(&self) -> Result<u64, AppError> {
    self.request(|reply| Command::DataSize { reply }).await
  }

  pub async fn import(&self, blob: Vec<u8>) -> Result<UserProfile, AppError> {
    self.request(|reply| Command::Import { blob, reply }).await
  }

  pub async fn restore(&self) -> Result<UserProfile, AppError> {
    self.request(|reply| Command::Restore { reply }).await
  }

  pub async fn backup(&self) -> Result<(), AppError> {
    self.request(|reply| Command::Backup { reply }).await
  }

  /// Wipes stored data and starts over with a fresh profile.
  pub async fn reset(&self) -> Result<(), AppError> {
    self.request(|reply| Command::Reset { reply }).await
  }

  /// Asks the controller task to stop; queued writes are still flushed.
  pub async fn shutdown(&self) {
    let _ = self.commands.send(Command::Shutdown).await;
  }
}

/// A session score goes to the leaderboard when it beats the previous high
/// score, or ties it when `submit_on_tie` is set. Zero is never submitted.
fn qualifies_for_auto_submit(settings: &ControllerSettings, score: u64, previous_high: u64) -> bool {
  settings.auto_submit && score > 0 && (score > previous_high || (settings.submit_on_tie && score == previous_high))
}

struct Core {
  profile: UserProfile,
  session: GameSession,
  catalog: ChallengeCatalog,
  countdown: Option<Countdown>,
  next_generation: u64,
  settings: ControllerSettings,
  /// Weak so that a running countdown does not keep the queue open.
  ticks: mpsc::WeakSender<Command>,
  events: broadcast::Sender<GameEvent>,
  writer: PersistenceWriter,
  leaderboard: Arc<dyn LeaderboardGateway>,
}

impl Core {
  async fn run(mut self, mut rx: mpsc::Receiver<Command>, writer_task: JoinHandle<()>) {
    info!(target: "sportpulse_backend", username = %self.profile.display_name(), level = self.profile.stats.level, "Game controller started");
    while let Some(cmd) = rx.recv().await {
      if matches!(cmd, Command::Shutdown) {
        break;
      }
      self.handle(cmd).await;
      self.sync_countdown();
    }

    self.cancel_countdown();
    drop(self);
    if let Err(e) = writer_task.await {
      error!(target: "persistence", error = %e, "Write queue task failed");
    }
    info!(target: "sportpulse_backend", "Game controller stopped");
  }

  async fn handle(&mut self, cmd: Command) {
    match cmd {
      Command::Snapshot { reply } => {
        let _ = reply.send(Ok(self.snapshot()));
      }
      Command::CompleteOnboarding { request, reply } => {
        let _ = reply.send(self.complete_onboarding(request).await);
      }
      Command::UpdateUsername { username, reply } => {
        let _ = reply.send(self.update_username(&username));
      }
      Command::UpdateSkillLevel { level, reply } => {
        self.set_skill_level(level);
        self.writer.save(self.profile.clone());
        let _ = reply.send(Ok(self.profile.clone()));
      }
      Command::UpdatePreferences { preferences, reply } => {
        let level = preferences.preferred_skill_level;
        self.profile.preferences = preferences;
        self.set_skill_level(level);
        self.writer.save(self.profile.clone());
        let _ = reply.send(Ok(self.profile.clone()));
      }
      Command::StartChallenge { kind, reply } => {
        let _ = reply.send(self.start_challenge(kind));
      }
      Command::CompleteChallenge { score, reply } => {
        let completed = self.session.complete_challenge(score, Utc::now());
        let final_score = completed.map(|done| self.publish_completion(done));
        let _ = reply.send(Ok(CompleteOutcome { final_score, session: self.session.clone() }));
      }
      Command::Pause { reply } => {
        let result = self.session.pause().map_err(AppError::from).map(|()| self.after_transition());
        let _ = reply.send(result);
      }
      Command::Resume { reply } => {
        let result = self.session.resume().map_err(AppError::from).map(|()| self.after_transition());
        let _ = reply.send(result);
      }
      Command::EndSession { reply } => {
        let _ = reply.send(self.end_session());
      }
      Command::NewSession { reply } => {
        let _ = reply.send(self.new_session());
      }
      Command::Tick { generation } => self.tick(generation),
      Command::ScoreEntry { reply } => {
        let _ = reply.send(Ok(self.score_entry()));
      }
      Command::RecordShare { reply } => {
        let unlocked = achievements::evaluate_share(&mut self.profile.stats);
        if !unlocked.is_empty() {
          self.publish(GameEvent::AchievementsUnlocked { achievements: unlocked.clone() });
          self.writer.save(self.profile.clone());
        }
        let _ = reply.send(Ok(unlocked));
      }
      Command::FindAchievement { title, reply } => {
        let found = self.profile.stats.achievements.iter().find(|a| a.title == title).cloned();
        let _ = reply.send(found.ok_or_else(|| AppError::NotFound(format!("achievement '{title}'"))));
      }
      Command::Import { blob, reply } => {
        let result = match self.writer.import(blob).await {
          Ok(profile) => Ok(self.replace_profile(profile)),
          Err(e) => Err(e),
        };
        let _ = reply.send(result);
      }
      Command::Restore { reply } => {
        let result = match self.writer.restore().await {
          Ok(profile) => Ok(self.replace_profile(profile)),
          Err(e) => Err(e),
        };
        let _ = reply.send(result);
      }
      Command::Backup { reply } => {
        let _ = reply.send(self.writer.backup().await);
      }
      Command::Reset { reply } => {
        let result = self.writer.reset().await;
        self.replace_profile(None);
        warn!(target: "sportpulse_backend", ok = result.is_ok(), "Game data reset");
        let _ = reply.send(result);
      }
      Command::History { reply } => {
        let _ = reply.send(self.writer.history().await);
      }
      Command::Export { reply } => {
        let _ = reply.send(self.writer.export().await);
      }
      Command::DataSize { reply } => {
        let _ = reply.send(self.writer.data_size().await);
      }
      Command::OnboardingStatus { reply } => {
        let _ = reply.send(self.writer.onboarding_status().await);
      }
      Command::Shutdown => {}
    }
  }

  fn snapshot(&self) -> GameSnapshot {
    GameSnapshot {
      profile: self.profile.clone(),
      session: self.session.clone(),
      challenges: self.catalog.challenges(),
    }
  }

  fn publish(&self, event: GameEvent) {
    // No subscribers is fine.
    let _ = self.events.send(event);
  }

  fn after_transition(&self) -> GameSession {
    self.publish(GameEvent::StateChanged { state: self.session.state });
    self.session.clone()
  }

  fn publish_completion(&self, done: CompletedChallenge) -> u64 {
    let final_score = done.final_score;
    self.publish(GameEvent::ChallengeCompleted { challenge: done.challenge, final_score, timed_out: done.timed_out });
    self.publish(GameEvent::StateChanged { state: self.session.state });
    final_score
  }

  async fn complete_onboarding(&mut self, request: OnboardingRequest) -> Result<UserProfile, AppError> {
    let profile = request.into_profile()?;
    self.writer.complete_onboarding(profile.clone()).await?;
    info!(target: "sportpulse_backend", username = %profile.username, skill = ?profile.preferences.preferred_skill_level, "Onboarding completed");
    Ok(self.replace_profile(Some(profile)))
  }

  fn update_username(&mut self, raw: &str) -> Result<UserProfile, AppError> {
    self.profile.username = validate_username(raw)?;
    self.writer.save(self.profile.clone());
    Ok(self.profile.clone())
  }

  /// Keeps the preference, the stats copy and the catalog in step.
  fn set_skill_level(&mut self, level: SkillLevel) {
    self.profile.preferences.preferred_skill_level = level;
    self.profile.stats.skill_level = level;
    if self.catalog.skill_level() != level {
      self.catalog = ChallengeCatalog::generate(level);
      debug!(target: "session", skill = ?level, "Challenge catalog regenerated");
    }
  }

  fn start_challenge(&mut self, kind: ChallengeType) -> Result<GameSession, AppError> {
    let challenge = self
      .catalog
      .instantiate(kind)
      .ok_or_else(|| AppError::NotFound(format!("challenge type {kind:?}")))?;
    let now = Utc::now();
    self.session.start_challenge(challenge, now)?;
    self.profile.last_played_at = now;
    Ok(self.after_transition())
  }

  fn tick(&mut self, generation: u64) {
    if self.countdown.as_ref().map(Countdown::generation) != Some(generation) {
      debug!(target: "session", generation, "Stale tick discarded");
      return;
    }
    match self.session.tick(Utc::now()) {
      TickOutcome::Ignored => {}
      TickOutcome::Ticked { time_remaining } => self.publish(GameEvent::Tick { time_remaining }),
      TickOutcome::TimedOut(done) => {
        info!(target: "session", kind = ?done.challenge.kind, "Challenge timed out");
        self.publish(GameEvent::Tick { time_remaining: 0.0 });
        self.publish_completion(done);
      }
    }
  }

  /// Game over: folds the session into the stats exactly once, then saves,
  /// records history and optionally submits to the leaderboard.
  #[instrument(level = "info", skip(self), fields(session_score = self.session.session_score))]
  fn end_session(&mut self) -> Result<GameOverReport, AppError> {
    let now = Utc::now();
    let summary = self.session.end(now)?;
    let score = summary.session_score;
    let previous_high = self.profile.stats.high_score;

    let level_up = self.profile.stats.update_stats(score);
    let unlocked = achievements::evaluate(&mut self.profile.stats, &summary.challenges_completed);

    self.writer.save(self.profile.clone());
    self.writer.append_history(HistoryEntry {
      id: Uuid::new_v4(),
      session_id: summary.session_id,
      date: now,
      total_score: score,
      challenges_completed: summary.challenges_completed.clone(),
      duration: summary.duration_secs,
    });

    let auto_submitted = qualifies_for_auto_submit(&self.settings, score, previous_high);
    if auto_submitted {
      self.spawn_submit(LeaderboardEntry {
        username: self.profile.display_name().to_string(),
        score,
        rank: 0,
        date: now,
        challenge_type: None,
      });
    }

    self.publish(GameEvent::StateChanged { state: GameState::GameOver });
    if let Some(LevelUp { old_level, new_level }) = level_up {
      self.publish(GameEvent::LevelUp { old_level, new_level });
    }
    if !unlocked.is_empty() {
      self.publish(GameEvent::AchievementsUnlocked { achievements: unlocked.clone() });
    }
    self.publish(GameEvent::GameOver { session_score: score, challenges_completed: summary.challenges_completed.len() });
    info!(target: "session", score, completed = summary.challenges_completed.len(), games_played = self.profile.stats.games_played, "Game over");

    Ok(GameOverReport {
      session_score: score,
      challenges_completed: summary.challenges_completed.len(),
      level_up: level_up.map(|l| l.new_level),
      unlocked,
      auto_submitted,
      profile: self.profile.clone(),
    })
  }

  fn spawn_submit(&self, entry: LeaderboardEntry) {
    let leaderboard = self.leaderboard.clone();
    let events = self.events.clone();
    tokio::spawn(async move {
      let score = entry.score;
      match leaderboard.submit_score(entry).await {
        Ok(()) => {
          let _ = events.send(GameEvent::ScoreSubmitted { score });
        }
        Err(e) => {
          warn!(target: "leaderboard", error = %e, score, "Automatic score submission failed");
          let _ = events.send(GameEvent::Notice { message: format!("Score submission failed: {e}") });
        }
      }
    });
  }

  fn new_session(&mut self) -> Result<GameSession, AppError> {
    if self.session.state != GameState::GameOver && !self.session.is_untouched() {
      return Err(SessionError::InvalidTransition { action: "start a new session", state: self.session.state }.into());
    }
    self.session = GameSession::new(Utc::now());
    Ok(self.after_transition())
  }

  fn score_entry(&self) -> Option<LeaderboardEntry> {
    let high = self.profile.stats.high_score;
    (high > 0).then(|| LeaderboardEntry {
      username: self.profile.display_name().to_string(),
      score: high,
      rank: 0,
      date: Utc::now(),
      challenge_type: None,
    })
  }

  /// Installs a new profile (or a blank one) along with a fresh session and catalog.
  fn replace_profile(&mut self, profile: Option<UserProfile>) -> UserProfile {
    self.cancel_countdown();
    self.profile = profile.unwrap_or_default();
    self.catalog = ChallengeCatalog::generate(self.profile.preferences.preferred_skill_level);
    self.session = GameSession::new(Utc::now());
    self.publish(GameEvent::StateChanged { state: self.session.state });
    self.profile.clone()
  }

  fn sync_countdown(&mut self) {
    let should_run = self.session.countdown_should_run();
    if should_run && self.countdown.is_none() {
      self.next_generation += 1;
      self.countdown = Some(Countdown::spawn(
        self.next_generation,
        self.settings.tick,
        self.ticks.clone(),
        |generation| Command::Tick { generation },
      ));
    } else if !should_run {
      self.cancel_countdown();
    }
  }

  fn cancel_countdown(&mut self) {
    if let Some(countdown) = self.countdown.take() {
      countdown.cancel();
    }
  }
}
