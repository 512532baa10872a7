// crates/schema-gate-core/src/core/migration.rs
// ============================================================================
// Module: Schema Gate Migration Descriptors
// Description: Dependency-tagged units of schema change.
// Purpose: Carry migration identity, ordering constraints, and opaque payloads.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`MigrationDescriptor`] names one unit of schema change, the migrations it
//! depends on, and an opaque payload understood only by the apply target.
//! Descriptors are built by template/module loaders or operators, consumed by
//! the resolver and executor, and never mutated afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::MigrationId;

// ============================================================================
// SECTION: Migration Kind
// ============================================================================

/// Origin classification of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    /// Shipped with a tenant template.
    Template,
    /// Shipped with an installable module.
    Module,
    /// Authored by an operator for a single tenant.
    Custom,
}

// ============================================================================
// SECTION: Migration Descriptor
// ============================================================================

/// Immutable migration descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationDescriptor {
    /// Unique migration identifier.
    pub migration_id: MigrationId,
    /// Identifiers that must be applied before this migration.
    pub dependencies: Vec<MigrationId>,
    /// Opaque change payload interpreted by the apply target.
    pub payload: Value,
    /// Origin classification.
    pub kind: MigrationKind,
}

impl MigrationDescriptor {
    /// Creates a descriptor with no dependencies and a null payload.
    #[must_use]
    pub fn new(migration_id: impl Into<MigrationId>, kind: MigrationKind) -> Self {
        Self {
            migration_id: migration_id.into(),
            dependencies: Vec::new(),
            payload: Value::Null,
            kind,
        }
    }

    /// Returns the descriptor with the given dependencies.
    #[must_use]
    pub fn depends_on<I, T>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<MigrationId>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the descriptor with the given payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}
