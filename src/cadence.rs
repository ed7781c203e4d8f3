//! Polling cadence: how long the loop waits between cycles.
//!
//! The loop is in one of two states. After a clean cycle it is
//! [`LoopState::Running`] and waits the normal poll interval. After a cycle
//! that failed as a whole it is [`LoopState::BackingOff`] and waits the shorter
//! backoff interval, plus optional random jitter, before trying again.
//!
//! Waiting goes through [`Sleeper`] so tests can observe the chosen delays
//! without spending them.

use rand::{rng, Rng};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    BackingOff,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopState::Running => "running",
            LoopState::BackingOff => "backing_off",
        })
    }
}

/// Delay rules for both loop states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadencePolicy {
    pub poll_interval: Duration,
    pub backoff_interval: Duration,
    /// Upper bound of the random extra added to the backoff interval.
    pub backoff_jitter: Duration,
}

impl CadencePolicy {
    /// Delay to wait before the next cycle when the loop is in `state`.
    pub fn next_delay(&self, state: LoopState) -> Duration {
        match state {
            LoopState::Running => self.poll_interval,
            LoopState::BackingOff => self.backoff_interval + self.jitter(),
        }
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.backoff_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng().random_range(0..=max_ms))
    }
}

/// Suspends the loop between cycles.
pub trait Sleeper {
    async fn sleep(&self, delay: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
