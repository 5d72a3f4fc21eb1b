//! Rate and safety policy for a run.
//!
//! The governor holds no state of its own; every call takes the run's
//! [`RunState`] explicitly so a run can be inspected and replayed in tests.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::LimitSettings;

/// Governor limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Maximum attempts per calendar day.
    pub daily_limit: u32,
    /// Pause between consecutive sends.
    pub send_delay: Duration,
    /// Consecutive failures that halt a run. Zero disables the breaker.
    pub error_spike_threshold: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            daily_limit: 100,
            send_delay: Duration::from_secs(5),
            error_spike_threshold: 3,
        }
    }
}

impl From<&LimitSettings> for GovernorConfig {
    fn from(limits: &LimitSettings) -> Self {
        Self {
            daily_limit: limits.daily_limit,
            send_delay: limits.send_delay(),
            error_spike_threshold: limits.error_spike_threshold,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    /// Provider calls made.
    pub attempted: u32,
    /// Calls the provider accepted.
    pub succeeded: u32,
    /// Calls that failed.
    pub failed: u32,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Sends still allowed today.
    pub remaining: u32,
}

impl RunState {
    /// Starts a run with the given daily budget left.
    #[must_use]
    pub const fn new(remaining: u32) -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failed: 0,
            consecutive_failures: 0,
            remaining,
        }
    }
}

/// Result of one provider call, as seen by the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Provider accepted the message.
    Success,
    /// Call failed.
    Failure,
}

/// Why the governor refused a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Daily budget exhausted.
    DailyLimitReached,
    /// Too many consecutive failures.
    ErrorSpike,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyLimitReached => f.write_str("daily limit reached"),
            Self::ErrorSpike => f.write_str("error spike"),
        }
    }
}

/// Gate decision before a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Send may proceed; one unit of budget was taken.
    Allow,
    /// Send must not happen.
    Deny(DenyReason),
}

/// Rate and safety governor.
#[derive(Debug, Clone, Default)]
pub struct Governor {
    config: GovernorConfig,
}

impl Governor {
    /// Creates a governor.
    #[must_use]
    pub const fn new(config: GovernorConfig) -> Self {
        Self { config }
    }

    /// Returns the limits in force.
    #[must_use]
    pub const fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Budget left given the attempts already made today.
    #[must_use]
    pub const fn remaining_budget(&self, sent_today: u32) -> u32 {
        self.config.daily_limit.saturating_sub(sent_today)
    }

    /// Fresh state for a run.
    #[must_use]
    pub const fn start(&self, sent_today: u32) -> RunState {
        RunState::new(self.remaining_budget(sent_today))
    }

    /// Reports whether the next send would be denied, without changing state.
    #[must_use]
    pub const fn check(&self, state: &RunState) -> Option<DenyReason> {
        if state.remaining == 0 {
            return Some(DenyReason::DailyLimitReached);
        }
        if self.config.error_spike_threshold > 0
            && state.consecutive_failures >= self.config.error_spike_threshold
        {
            return Some(DenyReason::ErrorSpike);
        }
        None
    }

    /// Gates the next send, taking one unit of budget when allowed.
    pub const fn before_send(&self, state: &mut RunState) -> Gate {
        if let Some(reason) = self.check(state) {
            return Gate::Deny(reason);
        }
        state.remaining -= 1;
        Gate::Allow
    }

    /// Updates counters after a provider call.
    pub const fn after_send(&self, state: &mut RunState, outcome: Outcome) {
        state.attempted += 1;
        match outcome {
            Outcome::Success => {
                state.succeeded += 1;
                state.consecutive_failures = 0;
            }
            Outcome::Failure => {
                state.failed += 1;
                state.consecutive_failures += 1;
            }
        }
    }

    /// Pause between consecutive sends.
    #[must_use]
    pub const fn inter_message_delay(&self) -> Duration {
        self.config.send_delay
    }
}
