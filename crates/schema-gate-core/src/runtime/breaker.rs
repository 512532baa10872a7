// crates/schema-gate-core/src/runtime/breaker.rs
// ============================================================================
// Module: Schema Gate Circuit Breaker
// Description: Consecutive-failure breaker guarding one tenant's executor.
// Purpose: Stop hammering a target that keeps failing until a cool-down passes.
// Dependencies: crate::core::time, serde, thiserror
// ============================================================================

//! ## Overview
//! The breaker has three states. `Closed` counts consecutive failures and
//! opens once the threshold is reached. `Open` rejects every call until the
//! reset timeout has elapsed since the last failure, then admits a single
//! `HalfOpen` trial. The trial's result either closes the breaker and clears
//! the counter, or reopens it and restarts the timeout.
//!
//! Time is supplied by the caller, so the breaker never reads a clock itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Timestamp;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default consecutive-failure threshold.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default cool-down before a half-open trial, in milliseconds.
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 60_000;

/// Breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Cool-down after the last failure before a trial is admitted.
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Breaker status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    /// Calls flow; failures are counted.
    Closed,
    /// Calls are rejected until the cool-down passes.
    Open,
    /// One trial call is in flight.
    HalfOpen,
}

/// Observable breaker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitState {
    /// Current status.
    pub status: CircuitStatus,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// Time of the most recent failure.
    pub last_failure_at: Option<Timestamp>,
}

/// Rejection returned while the breaker is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit open after {consecutive_failures} consecutive failures")]
pub struct CircuitOpenError {
    /// Failures recorded when the call was rejected.
    pub consecutive_failures: u32,
    /// Remaining cool-down, when it can be computed.
    pub retry_after_ms: Option<u64>,
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Per-tenant circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    /// Tuning.
    config: BreakerConfig,
    /// Mutable state.
    state: CircuitState,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub const fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState {
                status: CircuitStatus::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
            },
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &CircuitState {
        &self.state
    }

    /// Asks permission for one call at `now`.
    ///
    /// An open breaker whose cool-down has elapsed moves to half-open and
    /// admits exactly this call; further calls are rejected until the trial
    /// is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpenError`] when the call must not reach the target.
    pub fn try_acquire(&mut self, now: &Timestamp) -> Result<(), CircuitOpenError> {
        match self.state.status {
            CircuitStatus::Closed => Ok(()),
            CircuitStatus::HalfOpen => Err(self.rejection(None)),
            CircuitStatus::Open => {
                let elapsed = self
                    .state
                    .last_failure_at
                    .as_ref()
                    .and_then(|last| now.millis_since(last));
                match elapsed {
                    Some(elapsed) if elapsed >= self.config.reset_timeout_ms => {
                        self.state.status = CircuitStatus::HalfOpen;
                        Ok(())
                    }
                    Some(elapsed) => {
                        Err(self.rejection(Some(self.config.reset_timeout_ms - elapsed)))
                    }
                    None => Err(self.rejection(None)),
                }
            }
        }
    }

    /// Records a successful call; closes the breaker and clears the counter.
    pub fn record_success(&mut self) {
        self.state.status = CircuitStatus::Closed;
        self.state.consecutive_failures = 0;
        self.state.last_failure_at = None;
    }

    /// Records a failed call at `now`.
    pub fn record_failure(&mut self, now: Timestamp) {
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        self.state.last_failure_at = Some(now);
        let threshold_reached = self.state.consecutive_failures >= self.config.failure_threshold;
        if self.state.status == CircuitStatus::HalfOpen || threshold_reached {
            self.state.status = CircuitStatus::Open;
        }
    }

    /// Returns an unrecorded half-open trial, reopening the breaker.
    ///
    /// The last failure time is kept, so the next call is admitted as a new
    /// trial immediately.
    pub fn release_trial(&mut self) {
        if self.state.status == CircuitStatus::HalfOpen {
            self.state.status = CircuitStatus::Open;
        }
    }

    /// Builds a rejection for the current state.
    const fn rejection(&self, retry_after_ms: Option<u64>) -> CircuitOpenError {
        CircuitOpenError {
            consecutive_failures: self.state.consecutive_failures,
            retry_after_ms,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
