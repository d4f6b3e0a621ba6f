//! Ordered queue in front of the persistence gateway.
//!
//! Gameplay enqueues profile saves and history appends without waiting.
//! Jobs run one at a time in submission order, so a reset or import queued
//! after a save can never be overwritten by it, and a read queued after a
//! write sees that write. Failures of fire-and-forget jobs are published as
//! [`GameEvent::Notice`].

use std::sync::Arc;

use tokio::{
  sync::{broadcast, mpsc, oneshot},
  task::JoinHandle,
};
use tracing::{debug, error};

use crate::domain::{GameEvent, HistoryEntry};
use crate::error::{AppError, PersistenceError};
use crate::persistence::PersistenceGateway;
use crate::profile::UserProfile;

type Responder<T> = oneshot::Sender<Result<T, PersistenceError>>;

enum WriteJob {
  Save(UserProfile),
  AppendHistory(HistoryEntry),
  CompleteOnboarding(UserProfile, Responder<()>),
  Import(Vec<u8>, Responder<Option<UserProfile>>),
  Restore(Responder<Option<UserProfile>>),
  Backup(Responder<()>),
  Reset(Responder<()>),
  History(Responder<Vec<HistoryEntry>>),
  Export(Responder<Vec<u8>>),
  DataSize(Responder<u64>),
  OnboardingStatus(Responder<bool>),
}

#[derive(Clone)]
pub struct PersistenceWriter {
  tx: mpsc::UnboundedSender<WriteJob>,
}

impl PersistenceWriter {
  /// The task exits once every writer handle is dropped and the queue is drained.
  pub fn spawn(store: Arc<dyn PersistenceGateway>, events: broadcast::Sender<GameEvent>) -> (Self, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run(store, events, rx));
    (Self { tx }, handle)
  }

  pub fn save(&self, profile: UserProfile) {
    self.enqueue(WriteJob::Save(profile));
  }

  pub fn append_history(&self, entry: HistoryEntry) {
    self.enqueue(WriteJob::AppendHistory(entry));
  }

  /// Saves the onboarding profile, then sets the onboarding flag.
  pub async fn complete_onboarding(&self, profile: UserProfile) -> Result<(), AppError> {
    self.ask(|tx| WriteJob::CompleteOnboarding(profile, tx)).await
  }

  /// Returns the profile stored after the import.
  pub async fn import(&self, blob: Vec<u8>) -> Result<Option<UserProfile>, AppError> {
    self.ask(|tx| WriteJob::Import(blob, tx)).await
  }

  /// Returns the profile stored after the restore.
  pub async fn restore(&self) -> Result<Option<UserProfile>, AppError> {
    self.ask(WriteJob::Restore).await
  }

  pub async fn backup(&self) -> Result<(), AppError> {
    self.ask(WriteJob::Backup).await
  }

  pub async fn reset(&self) -> Result<(), AppError> {
    self.ask(WriteJob::Reset).await
  }

  pub async fn history(&self) -> Result<Vec<HistoryEntry>, AppError> {
    self.ask(WriteJob::History).await
  }

  pub async fn export(&self) -> Result<Vec<u8>, AppError> {
    self.ask(WriteJob::Export).await
  }

  pub async fn data_size(&self) -> Result<u64, AppError> {
    self.ask(WriteJob::DataSize).await
  }

  pub async fn onboarding_status(&self) -> Result<bool, AppError> {
    self.ask(WriteJob::OnboardingStatus).await
  }

  fn enqueue(&self, job: WriteJob) {
    if self.tx.send(job).is_err() {
      error!(target: "persistence", "Write queue closed; dropping job");
    }
  }

  async fn ask<T>(&self, make: impl FnOnce(Responder<T>) -> WriteJob) -> Result<T, AppError> {
    let (tx, rx) = oneshot::channel();
    self.tx.send(make(tx)).map_err(|_| AppError::Unavailable)?;
    Ok(rx.await.map_err(|_| AppError::Unavailable)??)
  }
}

async fn run(store: Arc<dyn PersistenceGateway>, events: broadcast::Sender<GameEvent>, mut rx: mpsc::UnboundedReceiver<WriteJob>) {
  while let Some(job) = rx.recv().await {
    match job {
      WriteJob::Save(profile) => {
        if let Err(e) = store.save(&profile).await {
          notify(&events, &e);
        }
      }
      WriteJob::AppendHistory(entry) => {
        if let Err(e) = store.append_history(entry).await {
          notify(&events, &e);
        }
      }
      WriteJob::CompleteOnboarding(profile, reply) => {
        let result = match store.save(&profile).await {
          Ok(()) => store.mark_onboarding_completed().await,
          Err(e) => Err(e),
        };
        let _ = reply.send(result);
      }
      WriteJob::Import(blob, reply) => {
        let result = match store.import(&blob).await {
          Ok(()) => store.load().await,
          Err(e) => Err(e),
        };
        let _ = reply.send(result);
      }
      WriteJob::Restore(reply) => {
        let result = match store.restore().await {
          Ok(()) => store.load().await,
          Err(e) => Err(e),
        };
        let _ = reply.send(result);
      }
      WriteJob::Backup(reply) => {
        let _ = reply.send(store.backup().await);
      }
      WriteJob::Reset(reply) => {
        let _ = reply.send(store.reset().await);
      }
      WriteJob::History(reply) => {
        let _ = reply.send(store.load_history().await);
      }
      WriteJob::Export(reply) => {
        let _ = reply.send(store.export().await);
      }
      WriteJob::DataSize(reply) => {
        let _ = reply.send(store.data_size().await);
      }
      WriteJob::OnboardingStatus(reply) => {
        let _ = reply.send(store.is_onboarding_completed().await);
      }
    }
  }
  debug!(target: "persistence", "Write queue drained");
}

fn notify(events: &broadcast::Sender<GameEvent>, e: &PersistenceError) {
  error!(target: "persistence", error = %e, "Background write failed");
  let _ = events.send(GameEvent::Notice { message: e.to_string() });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::persistence::JsonFileStore;

  #[tokio::test]
  async fn jobs_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn PersistenceGateway> = Arc::new(JsonFileStore::new(dir.path()));
    let (events, _rx) = broadcast::channel(8);
    let (writer, handle) = PersistenceWriter::spawn(store.clone(), events);

    writer.save(UserProfile { username: "before".into(), ..UserProfile::default() });
    writer.reset().await.unwrap();
    assert!(store.load().await.unwrap().is_none());

    writer.save(UserProfile { username: "after".into(), ..UserProfile::default() });
    writer.backup().await.unwrap();
    assert_eq!(store.load().await.unwrap().unwrap().username, "after");

    drop(writer);
    handle.await.unwrap();
  }

  #[tokio::test]
  async fn failed_background_save_becomes_notice() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the data directory should be.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"x").unwrap();
    let store: Arc<dyn PersistenceGateway> = Arc::new(JsonFileStore::new(&blocker));
    let (events, mut rx) = broadcast::channel(8);
    let (writer, _handle) = PersistenceWriter::spawn(store, events);

    writer.save(UserProfile::default());
    match rx.recv().await.unwrap() {
      GameEvent::Notice { message } => assert!(message.starts_with("Failed to"), "{message}"),
      other => panic!("unexpected event {other:?}"),
    }
  }

  #[tokio::test]
  async fn reads_see_queued_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn PersistenceGateway> = Arc::new(JsonFileStore::new(dir.path()));
    let (events, _rx) = broadcast::channel(8);
    let (writer, _handle) = PersistenceWriter::spawn(store, events);

    for round in 0..20u64 {
      writer.save(UserProfile { username: format!("player{round}"), ..UserProfile::default() });
      writer.append_history(HistoryEntry {
        id: uuid::Uuid::new_v4(),
        session_id: uuid::Uuid::new_v4(),
        date: chrono::Utc::now(),
        total_score: round,
        challenges_completed: Vec::new(),
        duration: 1.0,
      });

      let history = writer.history().await.unwrap();
      assert_eq!(history.len() as u64, round + 1);
      assert_eq!(history.last().unwrap().total_score, round);

      let doc: serde_json::Value = serde_json::from_slice(&writer.export().await.unwrap()).unwrap();
      assert_eq!(doc["userProfile"]["username"], format!("player{round}"));
      assert!(writer.data_size().await.unwrap() > 0);
    }
  }

  #[tokio::test]
  async fn onboarding_sets_flag() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn PersistenceGateway> = Arc::new(JsonFileStore::new(dir.path()));
    let (events, _rx) = broadcast::channel(8);
    let (writer, _handle) = PersistenceWriter::spawn(store.clone(), events);

    writer.complete_onboarding(UserProfile { username: "rookie".into(), ..UserProfile::default() }).await.unwrap();
    assert!(store.is_onboarding_completed().await.unwrap());
    assert!(writer.onboarding_status().await.unwrap());
    assert_eq!(store.load().await.unwrap().unwrap().username, "rookie");
  }
}
