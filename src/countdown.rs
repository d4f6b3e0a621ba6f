//! Cancelable per-challenge countdown.
//!
//! A countdown is a spawned task that pushes a tick message into the
//! controller's queue once per period. It never touches session state itself.
//! Dropping the handle aborts the task, and every tick carries the generation
//! it was started with so the controller can discard ticks that were already
//! queued when the countdown got cancelled.

use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle, time::{interval_at, Instant, MissedTickBehavior}};
use tracing::debug;

pub struct Countdown {
  generation: u64,
  handle: JoinHandle<()>,
}

impl Countdown {
  /// Starts ticking one `period` from now. `make_tick` builds the message for
  /// each tick; the task stops on its own once the receiver is gone.
  pub fn spawn<M, F>(generation: u64, period: Duration, tx: mpsc::WeakSender<M>, make_tick: F) -> Self
  where
    M: Send + 'static,
    F: Fn(u64) -> M + Send + 'static,
  {
    let first = Instant::now() + period;
    let handle = tokio::spawn(async move {
      let mut interval = interval_at(first, period);
      interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        let Some(tx) = tx.upgrade() else { break };
        if tx.send(make_tick(generation)).await.is_err() {
          break;
        }
      }
    });
    debug!(target: "session", generation, period_ms = period.as_millis() as u64, "Countdown started");
    Self { generation, handle }
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn cancel(self) {
    debug!(target: "session", generation = self.generation, "Countdown cancelled");
    drop(self);
  }
}

impl Drop for Countdown {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
