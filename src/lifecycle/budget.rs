use std::time::Duration;
use tokio::time::Instant;

use crate::config::ReconnectPolicy;

/// Remaining attempts and time for one reconnection loop.
///
/// The time budget is a deadline fixed when the loop starts. Either budget may be
/// unbounded; the loop continues while every bounded budget still has room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBudget {
    remaining_attempts: Option<u32>,
    deadline: Option<Instant>,
    started: Instant,
    attempts: u32,
}

impl ReconnectBudget {
    pub fn new(policy: &ReconnectPolicy, started: Instant) -> Self {
        Self {
            remaining_attempts: policy.max_attempts(),
            deadline: policy.max_duration().map(|budget| started + budget),
            started,
            attempts: 0,
        }
    }

    /// Records one finished attempt.
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
        if let Some(remaining) = self.remaining_attempts.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    pub fn has_remaining(&self, now: Instant) -> bool {
        let attempts_left = self.remaining_attempts.is_none_or(|remaining| remaining > 0);
        let time_left = self.deadline.is_none_or(|deadline| now < deadline);
        attempts_left && time_left
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}
