// crates/schema-gate-core/src/core/execution.rs
// ============================================================================
// Module: Schema Gate Execution Records
// Description: Per-migration outcomes, memento handles, and integrity baselines.
// Purpose: Provide serializable records produced by the executor for audit.
// Dependencies: crate::core::{hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The executor produces one [`ExecutionOutcome`] per migration in resolved
//! order. The core only produces these records; persisting them is the job
//! of an [`crate::audit::AuditSink`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::MigrationId;
use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Status of a single migration within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The apply capability reported success.
    Applied,
    /// The apply capability reported failure.
    Failed,
    /// The migration was not attempted.
    Skipped,
}

/// Per-migration execution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Migration identifier.
    pub migration_id: MigrationId,
    /// Outcome status.
    pub status: OutcomeStatus,
    /// Time spent in the apply call, in milliseconds.
    pub duration_ms: u64,
    /// Failure or skip detail.
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// Builds an applied outcome.
    #[must_use]
    pub const fn applied(migration_id: MigrationId, duration_ms: u64) -> Self {
        Self {
            migration_id,
            status: OutcomeStatus::Applied,
            duration_ms,
            error: None,
        }
    }

    /// Builds a failed outcome.
    #[must_use]
    pub const fn failed(migration_id: MigrationId, duration_ms: u64, error: String) -> Self {
        Self {
            migration_id,
            status: OutcomeStatus::Failed,
            duration_ms,
            error: Some(error),
        }
    }

    /// Builds a skipped outcome with a reason.
    #[must_use]
    pub fn skipped(migration_id: MigrationId, reason: &str) -> Self {
        Self {
            migration_id,
            status: OutcomeStatus::Skipped,
            duration_ms: 0,
            error: Some(reason.to_string()),
        }
    }
}

/// Overall status of an execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every pending migration was applied.
    Succeeded,
    /// A migration failed and the memento was restored.
    RolledBack,
    /// A migration failed and the memento restore also failed.
    RollbackFailed,
    /// The run stopped between steps on request.
    Cancelled,
    /// The circuit breaker rejected the run.
    Rejected,
}

// ============================================================================
// SECTION: Memento Handle
// ============================================================================

/// Opaque restore point returned by a memento provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MementoHandle {
    /// Provider-specific reference (backup id, savepoint name, ...).
    pub reference: String,
    /// Capture time.
    pub captured_at: Timestamp,
}

// ============================================================================
// SECTION: Integrity Baseline
// ============================================================================

/// Recorded integrity root for a tenant after a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityBaseline {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Root hash of the post-apply schema tree.
    pub root: HashDigest,
    /// Hash algorithm used for the tree.
    pub algorithm: HashAlgorithm,
    /// Number of tables covered by the tree.
    pub table_count: usize,
    /// Recording time.
    pub recorded_at: Timestamp,
}
