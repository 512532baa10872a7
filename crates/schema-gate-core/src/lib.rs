// crates/schema-gate-core/src/lib.rs
// ============================================================================
// Module: Schema Gate Core Library
// Description: Public API surface for the Schema Gate migration engine.
// Purpose: Expose schema types, capability interfaces, and runtime components.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Schema Gate plans, sequences, and safely executes schema migrations
//! against many independently owned tenant databases. It orders migrations
//! by dependency, diffs schema snapshots, proves schema integrity with a hash
//! tree, and applies migrations behind a circuit breaker with memento
//! rollback, all driven by a guarded provisioning workflow.
//!
//! The crate never talks to a database directly. Hosts supply the apply,
//! introspection, memento, baseline, and clock capabilities through
//! [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::AuditSink;
pub use audit::ExecutionAuditEvent;
pub use audit::FileAuditSink;
pub use audit::InMemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::TransitionAuditEvent;
pub use interfaces::ApplyError;
pub use interfaces::ApplyTarget;
pub use interfaces::BaselineStore;
pub use interfaces::Clock;
pub use interfaces::ColumnMatcher;
pub use interfaces::Guard;
pub use interfaces::IntrospectionError;
pub use interfaces::MementoError;
pub use interfaces::MementoProvider;
pub use interfaces::SchemaIntrospector;
pub use interfaces::StoreError;
pub use interfaces::TableMatcher;
pub use runtime::*;
