//! Per-backend circuit breaker
//!
//! Two states only. An open breaker closes again purely as a function of time
//! since the last recorded failure; the first call after that is the trial
//! call. Because the failure count is not cleared on that transition, a
//! failing trial call reopens the breaker immediately.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use storyforge_config::BreakerConfig;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    /// Calls are allowed
    Closed,
    /// Calls are skipped until the reset timeout has elapsed
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Thresholds shared by every breaker in one orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// Time after the last failure before an open breaker allows a trial call
    pub reset_timeout: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        BreakerConfig::default().into()
    }
}

impl From<BreakerConfig> for BreakerPolicy {
    fn from(config: BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            reset_timeout: config.reset_timeout,
        }
    }
}

/// Failure-tracking state for one backend
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    policy: BreakerPolicy,
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
        }
    }

    /// Count a failure at `now`; opens once the threshold is reached.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(now);
        if self.failure_count >= self.policy.failure_threshold {
            self.state = CircuitState::Open;
        }
    }

    /// Reset to a clean closed state.
    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.last_failure = None;
        self.state = CircuitState::Closed;
    }

    /// Whether calls should be skipped at `now`.
    ///
    /// An open breaker whose last failure is older than the reset timeout
    /// transitions to closed here and answers `false`.
    pub fn is_open(&mut self, now: DateTime<Utc>) -> bool {
        if self.state == CircuitState::Closed {
            return false;
        }

        let elapsed_past_timeout = match self.last_failure {
            // A clock that went backwards counts as "not elapsed"
            Some(last) => (now - last)
                .to_std()
                .is_ok_and(|elapsed| elapsed > self.policy.reset_timeout),
            None => true,
        };

        if elapsed_past_timeout {
            self.state = CircuitState::Closed;
            false
        } else {
            true
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    #[must_use]
    pub fn last_failure(&self) -> Option<DateTime<Utc>> {
        self.last_failure
    }

    /// Point-in-time view for diagnostics. Does not apply the time-based transition.
    #[must_use]
    pub fn snapshot(&self, backend: &str) -> BreakerSnapshot {
        BreakerSnapshot {
            backend: backend.to_string(),
            state: self.state,
            failure_count: self.failure_count,
            last_failure: self.last_failure,
        }
    }
}

/// Serializable breaker state for diagnostics output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub backend: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<DateTime<Utc>>,
}

impl BreakerSnapshot {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }
}
