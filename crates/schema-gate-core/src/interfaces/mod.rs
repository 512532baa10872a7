// crates/schema-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Schema Gate Interfaces
// Description: Backend-agnostic capabilities consumed by the engine.
// Purpose: Define the contract surfaces for apply targets, snapshots, and mementos.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces describe how Schema Gate reaches real databases without
//! embedding engine-specific details. Implementations are supplied by the
//! host: SQL execution, schema introspection, backup/restore, baseline
//! persistence, and the clock. Compatibility predicates are also expressed
//! here so callers can plug their own table and column equivalence rules.
//! Closures implement the predicate traits directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ColumnDescriptor;
use crate::core::IntegrityBaseline;
use crate::core::MementoHandle;
use crate::core::MigrationDescriptor;
use crate::core::SchemaSnapshot;
use crate::core::TableSchema;
use crate::core::TenantId;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Apply Target
// ============================================================================

/// Apply capability errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The target rejected or failed the migration.
    #[error("apply failed: {0}")]
    Failed(String),
}

/// Executes one migration's effect against the real target.
pub trait ApplyTarget {
    /// Applies a single migration.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the target reports a failure.
    fn apply(&self, migration: &MigrationDescriptor) -> Result<(), ApplyError>;
}

// ============================================================================
// SECTION: Schema Introspection
// ============================================================================

/// Snapshot introspection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    /// The target could not be read.
    #[error("schema introspection failed: {0}")]
    Unavailable(String),
}

/// Reads the current schema of a target.
pub trait SchemaIntrospector {
    /// Returns the current schema snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`IntrospectionError`] when the schema cannot be read.
    fn current_schema(&self) -> Result<SchemaSnapshot, IntrospectionError>;
}

// ============================================================================
// SECTION: Memento Provider
// ============================================================================

/// Memento capture and restore errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MementoError {
    /// Capturing a restore point failed.
    #[error("memento capture failed: {0}")]
    Capture(String),
    /// Restoring a restore point failed.
    #[error("memento restore failed: {0}")]
    Restore(String),
    /// Releasing a restore point failed.
    #[error("memento discard failed: {0}")]
    Discard(String),
}

/// Backup and restore primitive for a target.
pub trait MementoProvider {
    /// Captures a restore point of the current target state.
    ///
    /// # Errors
    ///
    /// Returns [`MementoError::Capture`] when the restore point cannot be taken.
    fn capture(&self, at: Timestamp) -> Result<MementoHandle, MementoError>;

    /// Restores the target to a previously captured restore point.
    ///
    /// # Errors
    ///
    /// Returns [`MementoError::Restore`] when the restore fails.
    fn restore(&self, handle: &MementoHandle) -> Result<(), MementoError>;

    /// Releases a restore point that is no longer needed.
    ///
    /// # Errors
    ///
    /// Returns [`MementoError::Discard`] when the restore point cannot be released.
    fn discard(&self, handle: &MementoHandle) -> Result<(), MementoError>;
}

// ============================================================================
// SECTION: Baseline Store
// ============================================================================

/// Baseline store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("baseline store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("baseline store corruption: {0}")]
    Corrupt(String),
    /// Store reported an error.
    #[error("baseline store error: {0}")]
    Store(String),
}

/// Persistence for per-tenant integrity baselines.
pub trait BaselineStore {
    /// Loads the latest baseline for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load(&self, tenant_id: &TenantId) -> Result<Option<IntegrityBaseline>, StoreError>;

    /// Saves a baseline, replacing any previous one for the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when saving fails.
    fn save(&self, baseline: &IntegrityBaseline) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time source for durations and breaker timeouts.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Compatibility Predicates
// ============================================================================

/// Table equivalence rule used by the table-level diff.
pub trait TableMatcher {
    /// Returns true when `old` and `new` describe the same logical table.
    fn tables_match(&self, old: &TableSchema, new: &TableSchema) -> bool;
}

impl<F> TableMatcher for F
where
    F: Fn(&TableSchema, &TableSchema) -> bool,
{
    fn tables_match(&self, old: &TableSchema, new: &TableSchema) -> bool {
        self(old, new)
    }
}

/// Column equivalence rule used by the column-level diff.
pub trait ColumnMatcher {
    /// Returns true when `old` and `new` describe the same logical column of `table`.
    fn columns_match(&self, table: &str, old: &ColumnDescriptor, new: &ColumnDescriptor) -> bool;
}

impl<F> ColumnMatcher for F
where
    F: Fn(&str, &ColumnDescriptor, &ColumnDescriptor) -> bool,
{
    fn columns_match(&self, table: &str, old: &ColumnDescriptor, new: &ColumnDescriptor) -> bool {
        self(table, old, new)
    }
}

/// Guard predicate evaluated against a workflow run's external context.
pub trait Guard<C> {
    /// Returns true when the guarded transition may fire.
    fn allows(&self, ctx: &C) -> bool;
}

impl<C, F> Guard<C> for F
where
    F: Fn(&C) -> bool,
{
    fn allows(&self, ctx: &C) -> bool {
        self(ctx)
    }
}
