// crates/schema-gate-core/src/core/mod.rs
// ============================================================================
// Module: Schema Gate Core Types
// Description: Canonical schema, migration, and execution record types.
// Purpose: Provide stable, serializable value types shared by every component.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types are immutable values: schema snapshots, migration descriptors,
//! execution outcomes, and the hashing primitives used by the integrity tree.
//! Runtime components consume them but never mutate them in place.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod execution;
pub mod hashing;
pub mod identifiers;
pub mod migration;
pub mod schema;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use execution::ExecutionOutcome;
pub use execution::IntegrityBaseline;
pub use execution::MementoHandle;
pub use execution::OutcomeStatus;
pub use execution::RunStatus;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::MigrationId;
pub use identifiers::PlaceId;
pub use identifiers::TenantId;
pub use identifiers::TransitionId;
pub use migration::MigrationDescriptor;
pub use migration::MigrationKind;
pub use schema::ColumnDescriptor;
pub use schema::SchemaSnapshot;
pub use schema::SnapshotError;
pub use schema::TableSchema;
pub use time::Timestamp;
