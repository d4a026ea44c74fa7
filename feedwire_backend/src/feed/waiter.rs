//! Long-poll support: park a request until its stream moves past a cursor.

use super::cursor::StreamKey;
use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Deadline used when `now + timeout` does not fit in an `Instant`.
const DEADLINE_CEILING: Duration = Duration::from_secs(24 * 60 * 60);

/// Signal fired by every write path that can make a stream ready.
///
/// Carries only a change counter; waiters re-run their own readiness check
/// when woken.
#[derive(Clone)]
pub struct UpdateNotifier {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for UpdateNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn notify(&self) {
        self.tx.send_modify(|seq| *seq = seq.wrapping_add(1));
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Ready,
    TimedOut,
    Cancelled,
}

/// Terminal result of a wait as seen by the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

#[derive(Clone)]
pub struct UpdateWaiter {
    notifier: UpdateNotifier,
    poll_interval: Duration,
    max_wait: Duration,
    permits: Arc<Semaphore>,
}

impl UpdateWaiter {
    pub fn new(notifier: UpdateNotifier, config: &FeedConfig) -> Self {
        Self {
            notifier,
            poll_interval: config.poll_interval,
            max_wait: config.max_wait,
            permits: Arc::new(Semaphore::new(config.max_concurrent_waiters)),
        }
    }

    /// Requested timeout capped at the configured maximum.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.max_wait).min(self.max_wait)
    }

    /// Number of additional waits that would be admitted right now.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Blocks until `is_ready` holds, `timeout` elapses, or `cancel` fires.
    ///
    /// `is_ready` is called once up front, after every notification and at
    /// least every poll interval; it must take and release its own storage
    /// access. A stream that is already ready answers without taking a slot.
    /// The deadline is never reported before it has passed. Fails fast with
    /// [`FeedError::Unavailable`] when a wait would park and the waiter is
    /// at capacity.
    pub async fn wait_until_ready<F>(
        &self,
        key: StreamKey,
        offset_id: i64,
        timeout: Duration,
        cancel: &CancellationToken,
        mut is_ready: F,
    ) -> FeedResult<WaitState>
    where
        F: FnMut() -> FeedResult<bool>,
    {
        let mut changes = self.notifier.subscribe();
        changes.borrow_and_update();
        if is_ready()? {
            tracing::debug!(?key, offset_id, "stream already ready");
            return Ok(WaitState::Ready);
        }

        let _permit = self.permits.clone().try_acquire_owned().map_err(|_| {
            tracing::warn!(?key, "rejecting wait, too many pending waiters");
            FeedError::Unavailable(anyhow!("too many pending update waits"))
        })?;

        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + DEADLINE_CEILING);
        tracing::debug!(?key, offset_id, ?timeout, "waiting for updates");

        let state = loop {
            let now = Instant::now();
            if now >= deadline {
                break WaitState::TimedOut;
            }

            let next_poll = now
                .checked_add(self.poll_interval)
                .map_or(deadline, |poll| poll.min(deadline));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break WaitState::Cancelled,
                changed = changes.changed() => {
                    if changed.is_err() {
                        sleep_until(next_poll).await;
                    }
                }
                _ = sleep_until(next_poll) => {}
            }

            changes.borrow_and_update();
            if is_ready()? {
                break WaitState::Ready;
            }
        };

        tracing::debug!(?key, offset_id, ?state, "wait finished");
        Ok(state)
    }
}
