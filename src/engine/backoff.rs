//! Reconnect delay schedule.

use std::time::Duration;

use crate::utils::error::Error;

/// Tunables for the reconnect schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// A session that streamed at least this long restarts the schedule.
    pub reset_after: Option<Duration>,
    /// Floor applied to the delay after an authentication failure.
    pub auth_failure_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            reset_after: Some(Duration::from_secs(300)),
            auth_failure_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Plain doubling: never resets, no special case for auth failures.
    pub fn doubling(initial: Duration, max: Duration) -> Self {
        Self { initial, max, reset_after: None, auth_failure_delay: Duration::ZERO }
    }

    pub fn start(&self) -> Backoff {
        Backoff::new(self.initial, self.max)
    }

    /// Delay before reconnecting after a session ended with `error` having
    /// streamed for `streamed_for` (`None` if it never reached streaming).
    pub fn delay_after(&self, state: &mut Backoff, error: &Error, streamed_for: Option<Duration>) -> Duration {
        if let (Some(reset_after), Some(streamed)) = (self.reset_after, streamed_for) {
            if streamed >= reset_after {
                log::debug!("session was healthy for {:?}; backoff reset", streamed);
                state.reset();
            }
        }
        let delay = state.next_delay();
        if error.is_auth() {
            delay.max(self.auth_failure_delay)
        } else {
            delay
        }
    }
}

/// Current position in the schedule. Owned by the supervisor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    initial: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { current: initial.min(max), initial, max }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the delay to sleep now and doubles the next one, capped at `max`.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial.min(self.max);
    }
}
