// crates/schema-gate-core/src/core/time.rs
// ============================================================================
// Module: Schema Gate Time Model
// Description: Canonical timestamp representations for outcomes and breakers.
// Purpose: Provide deterministic, replayable time values across records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Schema Gate uses explicit time values supplied through a
//! [`crate::interfaces::Clock`]. Runtime components never read wall-clock
//! time directly, which keeps circuit breaker tests deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in execution outcomes and breaker state.
///
/// # Invariants
/// - Values are explicitly provided by a clock; the core never reads wall-clock time.
/// - Elapsed time is only defined between timestamps of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value (interpreted as milliseconds).
    Logical(u64),
}

impl Timestamp {
    /// Returns milliseconds elapsed since `earlier`.
    ///
    /// Returns `None` when the kinds differ. Time running backwards saturates to zero.
    #[must_use]
    pub fn millis_since(&self, earlier: &Self) -> Option<u64> {
        match (self, earlier) {
            (Self::UnixMillis(now), Self::UnixMillis(then)) => {
                Some(u64::try_from(now.saturating_sub(*then)).unwrap_or(0))
            }
            (Self::Logical(now), Self::Logical(then)) => Some(now.saturating_sub(*then)),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn millis_since_same_kind() {
        assert_eq!(Timestamp::Logical(50).millis_since(&Timestamp::Logical(20)), Some(30));
        assert_eq!(Timestamp::UnixMillis(10).millis_since(&Timestamp::UnixMillis(40)), Some(0));
    }

    #[test]
    fn millis_since_mixed_kinds_is_undefined() {
        assert_eq!(Timestamp::Logical(50).millis_since(&Timestamp::UnixMillis(20)), None);
    }
}
