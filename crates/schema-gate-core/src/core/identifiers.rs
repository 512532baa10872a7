// crates/schema-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Schema Gate Identifiers
// Description: Opaque string identifiers for migrations, tenants, and workflows.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque and serialize as plain strings. They order
//! lexicographically, which the dependency resolver relies on for its
//! deterministic tie-break. Validation happens at the boundaries that consume
//! them (resolver, workflow builder) rather than inside these wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares a transparent string identifier with the shared conversions.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier!(
    /// Unique identifier of a migration descriptor.
    MigrationId
);

string_identifier!(
    /// Tenant (logical database) identifier owning a migration target.
    TenantId
);

string_identifier!(
    /// Place identifier within a provisioning workflow net.
    PlaceId
);

string_identifier!(
    /// Transition identifier within a provisioning workflow net.
    TransitionId
);
