//! Exponential backoff schedule and injectable pauses.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff: `initial * factor^(attempt - 1)` after each failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffSchedule {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Pause after the first failed attempt.
    pub initial: Duration,
    /// Multiplier applied for each further attempt.
    pub factor: u32,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial: Duration::from_secs(2),
            factor: 2,
        }
    }
}

impl BackoffSchedule {
    /// Creates a schedule.
    #[must_use]
    pub fn new(max_attempts: usize, initial: Duration, factor: u32) -> Self {
        Self {
            max_attempts,
            initial,
            factor,
        }
    }

    /// Pause to take after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let multiplier = self.factor.saturating_pow(exponent);
        self.initial.saturating_mul(multiplier)
    }

    /// Pauses taken between attempts when every attempt fails.
    #[must_use]
    pub fn pauses(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_after(a)).collect()
    }

    /// Returns true if another attempt is allowed after `attempt`.
    #[must_use]
    pub fn allows_retry_after(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

/// Something that waits between attempts.
#[async_trait]
pub trait Pause: Send + Sync {
    /// Waits for `duration`.
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested pauses and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingPause {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    /// Creates a new recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pauses requested so far.
    #[must_use]
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().clone()
    }
}

#[async_trait]
impl Pause for RecordingPause {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().push(duration);
    }
}
