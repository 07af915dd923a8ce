//! Global rate-limit gate.
//!
//! A global 429 blocks every route, not only the one that tripped it. The
//! first caller to see one extends the gate; every other caller waits for the
//! same deadline before its next attempt. There is no queue and no fairness:
//! once the deadline passes all waiters proceed together.

use std::time::Duration;

use async_lock::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Deadline shared by all requests issued through one client.
#[derive(Debug, Default)]
pub struct RateLimitGate {
    blocked_until: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current deadline, if one is set (it may already be in the past).
    pub async fn blocked_until(&self) -> Option<Instant> {
        *self.blocked_until.lock().await
    }

    /// Push the deadline to at least `now + cooldown`. Never shortens it.
    pub async fn set_cooldown(&self, cooldown: Duration) {
        let candidate = Instant::now() + cooldown;
        let mut guard = self.blocked_until.lock().await;
        let next = match *guard {
            Some(current) if current >= candidate => current,
            _ => candidate,
        };
        *guard = Some(next);
        debug!(cooldown_ms = cooldown.as_millis() as u64, "global rate-limit gate extended");
    }

    /// Block until the gate is open or `cancel` fires.
    ///
    /// The deadline is re-read after every sleep so an extension made while
    /// waiting is honoured.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let deadline = *self.blocked_until.lock().await;
            match deadline {
                Some(until) if until > Instant::now() => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep_until(until) => {}
                    }
                }
                _ => return Ok(()),
            }
        }
    }
}

/// Sleep for `duration`, returning [`Error::Cancelled`] if `cancel` fires first.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
