//! Leaderboard / social gateway and its mocked implementation.
//!
//! There is no real server: [`MockLeaderboard`] invents a field of players on
//! each fetch, keeps whatever was submitted through it, and fails every call
//! with `NoConnection` while switched offline.

use std::{
  sync::atomic::{AtomicBool, Ordering},
  time::Duration,
};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rand::{seq::SliceRandom, Rng};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{Achievement, ChallengeType, LeaderboardEntry};
use crate::error::ConnectivityError;

#[async_trait]
pub trait LeaderboardGateway: Send + Sync {
  async fn fetch_top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, ConnectivityError>;
  async fn submit_score(&self, entry: LeaderboardEntry) -> Result<(), ConnectivityError>;
  /// Returns the share URL.
  async fn share_achievement(&self, achievement: &Achievement) -> Result<String, ConnectivityError>;
  async fn share_score(&self, score: u64, challenge_type: Option<ChallengeType>) -> Result<String, ConnectivityError>;
  fn set_online(&self, online: bool);
  fn is_online(&self) -> bool;
}

const MOCK_PLAYERS: [&str; 10] = [
  "SportsMaster",
  "AviChampion",
  "PulsePlayer",
  "GameGuru",
  "ChallengeKing",
  "SkillSeeker",
  "ScoreStar",
  "PlayPro",
  "GameGenius",
  "SportSage",
];

pub struct MockLeaderboard {
  online: AtomicBool,
  latency: Duration,
  share_base_url: String,
  submitted: RwLock<Vec<LeaderboardEntry>>,
}

impl MockLeaderboard {
  pub fn new(latency: Duration, share_base_url: impl Into<String>, online: bool) -> Self {
    Self {
      online: AtomicBool::new(online),
      latency,
      share_base_url: share_base_url.into().trim_end_matches('/').to_string(),
      submitted: RwLock::new(Vec::new()),
    }
  }

  fn ensure_online(&self) -> Result<(), ConnectivityError> {
    if self.is_online() { Ok(()) } else { Err(ConnectivityError::NoConnection) }
  }

  fn share_url(&self) -> String {
    format!("{}/{}", self.share_base_url, Uuid::new_v4())
  }
}

/// The invented field of players. Kept out of async code since `ThreadRng`
/// is not `Send`.
fn mock_entries() -> Vec<LeaderboardEntry> {
  let mut rng = rand::thread_rng();
  let now = Utc::now();
  MOCK_PLAYERS
    .iter()
    .enumerate()
    .map(|(i, name)| LeaderboardEntry {
      username: name.to_string(),
      score: rng.gen_range(500u64..=5000).saturating_sub(i as u64 * 100),
      rank: 0,
      date: now - ChronoDuration::seconds(rng.gen_range(0..7 * 24 * 3600)),
      challenge_type: ChallengeType::ALL.choose(&mut rng).copied(),
    })
    .collect()
}

/// Sorts by score descending and assigns ranks 1..=n.
fn rank_top(mut entries: Vec<LeaderboardEntry>, n: usize) -> Vec<LeaderboardEntry> {
  entries.sort_by(|a, b| b.score.cmp(&a.score));
  entries.truncate(n);
  for (i, e) in entries.iter_mut().enumerate() {
    e.rank = u32::try_from(i + 1).unwrap_or(u32::MAX);
  }
  entries
}

#[async_trait]
impl LeaderboardGateway for MockLeaderboard {
  #[instrument(level = "debug", skip(self))]
  async fn fetch_top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, ConnectivityError> {
    self.ensure_online()?;
    let mut entries = mock_entries();
    entries.extend(self.submitted.read().await.iter().cloned());
    let top = rank_top(entries, n);
    debug!(target: "leaderboard", returned = top.len(), "Leaderboard fetched");
    Ok(top)
  }

  #[instrument(level = "info", skip_all, fields(username = %entry.username, score = entry.score))]
  async fn submit_score(&self, entry: LeaderboardEntry) -> Result<(), ConnectivityError> {
    self.ensure_online()?;
    if !self.latency.is_zero() {
      tokio::time::sleep(self.latency).await;
    }
    // Connectivity may have dropped while the request was in flight.
    self.ensure_online()?;
    self.submitted.write().await.push(entry);
    info!(target: "leaderboard", "Score submitted");
    Ok(())
  }

  async fn share_achievement(&self, achievement: &Achievement) -> Result<String, ConnectivityError> {
    self.ensure_online()?;
    let url = self.share_url();
    info!(target: "leaderboard", title = %achievement.title, %url, "Achievement shared");
    Ok(url)
  }

  async fn share_score(&self, score: u64, challenge_type: Option<ChallengeType>) -> Result<String, ConnectivityError> {
    self.ensure_online()?;
    let url = self.share_url();
    info!(target: "leaderboard", score, ?challenge_type, %url, "Score shared");
    Ok(url)
  }

  fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
    info!(target: "leaderboard", online, "Connectivity changed");
  }

  fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn board() -> MockLeaderboard {
    MockLeaderboard::new(Duration::ZERO, "https://example.test/share/", true)
  }

  fn entry(name: &str, score: u64) -> LeaderboardEntry {
    LeaderboardEntry { username: name.into(), score, rank: 0, date: Utc::now(), challenge_type: None }
  }

  #[tokio::test]
  async fn top_is_sorted_and_ranked() {
    let lb = board();
    let top = lb.fetch_top(10).await.unwrap();
    assert_eq!(top.len(), 10);
    for (i, e) in top.iter().enumerate() {
      assert_eq!(e.rank as usize, i + 1);
      assert!(e.score <= 5000);
      assert!(e.date <= Utc::now());
      assert!(e.date > Utc::now() - ChronoDuration::days(8));
    }
    assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(lb.fetch_top(3).await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn submitted_scores_are_merged() {
    let lb = board();
    lb.submit_score(entry("Champion", 1_000_000)).await.unwrap();
    let top = lb.fetch_top(5).await.unwrap();
    assert_eq!(top[0].username, "Champion");
    assert_eq!(top[0].rank, 1);
    assert_eq!(top.len(), 5);
  }

  #[tokio::test]
  async fn offline_fails_everything() {
    let lb = board();
    lb.set_online(false);
    assert!(!lb.is_online());
    assert_eq!(lb.fetch_top(10).await.unwrap_err(), ConnectivityError::NoConnection);
    assert_eq!(lb.submit_score(entry("x", 1)).await.unwrap_err(), ConnectivityError::NoConnection);
    assert_eq!(lb.share_score(10, None).await.unwrap_err(), ConnectivityError::NoConnection);

    lb.set_online(true);
    assert!(lb.fetch_top(1).await.is_ok());
  }

  #[tokio::test]
  async fn share_urls() {
    let lb = board();
    let url = lb.share_score(1200, Some(ChallengeType::Memory)).await.unwrap();
    let id = url.strip_prefix("https://example.test/share/").unwrap();
    assert!(Uuid::parse_str(id).is_ok());
    assert_ne!(url, lb.share_score(1200, None).await.unwrap());
  }

  #[tokio::test(start_paused = true)]
  async fn submit_waits_for_latency() {
    let lb = MockLeaderboard::new(Duration::from_secs(1), "https://example.test", true);
    let started = tokio::time::Instant::now();
    lb.submit_score(entry("slow", 10)).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
  }
}
