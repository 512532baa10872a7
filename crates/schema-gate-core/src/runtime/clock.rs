// crates/schema-gate-core/src/runtime/clock.rs
// ============================================================================
// Module: Schema Gate Clocks
// Description: Wall-clock and manually driven time sources.
// Purpose: Keep every timestamp in the core behind the Clock capability.
// Dependencies: crate::core::time, crate::interfaces
// ============================================================================

//! ## Overview
//! [`SystemClock`] is the only place the crate reads wall-clock time.
//! [`ManualClock`] lets tests and simulations advance time explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::core::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Wall-clock time in unix milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Timestamp::UnixMillis(i64::try_from(millis).unwrap_or(i64::MAX))
    }
}

// ============================================================================
// SECTION: Manual Clock
// ============================================================================

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// Current time.
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Creates a logical clock starting at zero.
    #[must_use]
    pub fn logical() -> Self {
        Self::new(Timestamp::Logical(0))
    }

    /// Sets the current time.
    pub fn set(&self, now: Timestamp) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Advances the clock by `millis`.
    pub fn advance(&self, millis: u64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = match *guard {
                Timestamp::Logical(value) => Timestamp::Logical(value.saturating_add(millis)),
                Timestamp::UnixMillis(value) => Timestamp::UnixMillis(
                    value.saturating_add(i64::try_from(millis).unwrap_or(i64::MAX)),
                ),
            };
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::logical()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.lock().map(|guard| *guard).unwrap_or(Timestamp::Logical(0))
    }
}
