// crates/schema-gate-core/src/runtime/executor.rs
// ============================================================================
// Module: Schema Gate Migration Executor
// Description: Guarded, sequential migration runs with memento rollback.
// Purpose: Apply resolved migrations so a failed run leaves a known state.
// Dependencies: crate::{audit, core, interfaces, runtime}, thiserror
// ============================================================================

//! ## Overview
//! A run resolves its migration set first, so cyclic or dangling sets fail
//! before anything is touched and never count against the circuit breaker.
//! The breaker is consulted next, then a single memento is captured and the
//! migrations are applied one at a time in resolved order.
//!
//! On the first apply failure the run stops, the remaining migrations are
//! reported as skipped, and the memento is restored. A failed restore is
//! reported separately because the target is then in an unknown state.
//! On success the memento is discarded, the schema is introspected, and the
//! integrity root of the result is recorded as the tenant's new baseline.
//!
//! The executor remembers migrations it has applied. A later run reports
//! them as skipped, which lets a cancelled run be resumed with the same set.
//!
//! A failed restore leaves the target in an unknown state. The executor then
//! refuses every run until the held restore point is rolled back or
//! discarded by an operator.
//!
//! [`MigrationExecutor::check_baseline`] compares the live schema against the
//! last recorded baseline to detect drift between runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use thiserror::Error;

use crate::audit::AuditSink;
use crate::audit::ExecutionAuditEvent;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::ExecutionOutcome;
use crate::core::HashAlgorithm;
use crate::core::HashDigest;
use crate::core::HashError;
use crate::core::IntegrityBaseline;
use crate::core::MementoHandle;
use crate::core::MigrationDescriptor;
use crate::core::MigrationId;
use crate::core::RunStatus;
use crate::core::TenantId;
use crate::interfaces::ApplyTarget;
use crate::interfaces::BaselineStore;
use crate::interfaces::Clock;
use crate::interfaces::IntrospectionError;
use crate::interfaces::MementoError;
use crate::interfaces::MementoProvider;
use crate::interfaces::SchemaIntrospector;
use crate::interfaces::StoreError;
use crate::runtime::breaker::BreakerConfig;
use crate::runtime::breaker::CircuitBreaker;
use crate::runtime::breaker::CircuitOpenError;
use crate::runtime::breaker::CircuitState;
use crate::runtime::integrity::IntegrityTree;
use crate::runtime::resolver::ResolveError;
use crate::runtime::resolver::resolve;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Executor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Circuit breaker tuning.
    pub breaker: BreakerConfig,
    /// Record an integrity baseline after each successful run.
    pub verify_integrity: bool,
    /// Hash algorithm for the integrity tree.
    pub hash_algorithm: HashAlgorithm,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            verify_integrity: true,
            hash_algorithm: DEFAULT_HASH_ALGORITHM,
        }
    }
}

/// Host capabilities used by one executor.
pub struct ExecutorCapabilities<A, M, I, B, K> {
    /// Applies individual migrations.
    pub target: A,
    /// Captures and restores restore points.
    pub memento: M,
    /// Reads the post-apply schema.
    pub introspector: I,
    /// Persists integrity baselines.
    pub baselines: B,
    /// Supplies timestamps.
    pub clock: K,
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Cooperative cancellation flag checked between migrations.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag {
    /// Shared flag.
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation before the next migration starts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Reports and Errors
// ============================================================================

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// `Succeeded` or `Cancelled`.
    pub status: RunStatus,
    /// One outcome per migration in resolved order.
    pub outcomes: Vec<ExecutionOutcome>,
    /// Baseline recorded by a successful run with integrity enabled.
    pub baseline: Option<IntegrityBaseline>,
    /// Restore point still held after cancellation.
    pub pending_memento: Option<MementoHandle>,
}

impl ExecutionReport {
    /// Returns true when every migration was applied or already present.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

/// Executor errors.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The migration set could not be ordered; nothing was touched.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The circuit breaker rejected the run; nothing was touched.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),
    /// The restore point could not be captured; nothing was applied.
    #[error("{0}")]
    MementoCapture(MementoError),
    /// A migration failed and the restore point was restored.
    #[error("migration {migration_id} failed and was rolled back: {reason}")]
    MigrationApply {
        /// Failed migration.
        migration_id: MigrationId,
        /// Failure detail.
        reason: String,
        /// Outcomes in resolved order.
        outcomes: Vec<ExecutionOutcome>,
    },
    /// A migration failed and restoring the restore point also failed.
    #[error("rollback failed after migration {migration_id}: {reason}")]
    RollbackFailed {
        /// Failed migration.
        migration_id: MigrationId,
        /// Restore failure detail.
        reason: String,
        /// Outcomes in resolved order.
        outcomes: Vec<ExecutionOutcome>,
        /// Restore point that could not be restored.
        memento: MementoHandle,
    },
    /// An earlier restore failed; runs are refused until the restore point is
    /// rolled back or discarded.
    #[error(
        "tenant requires intervention: restore point {} was not restored",
        .memento.reference
    )]
    InterventionRequired {
        /// Restore point whose restore failed.
        memento: MementoHandle,
    },
    /// Restoring or releasing a held restore point failed.
    #[error(transparent)]
    Memento(MementoError),
    /// The post-apply schema could not be read.
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
    /// The integrity tree could not be built.
    #[error("integrity tree error: {0}")]
    Integrity(#[from] HashError),
    /// The baseline could not be recorded.
    #[error(transparent)]
    Baseline(#[from] StoreError),
}

impl ExecutionError {
    /// Returns the per-migration outcomes carried by apply-time errors.
    #[must_use]
    pub fn outcomes(&self) -> &[ExecutionOutcome] {
        match self {
            Self::MigrationApply {
                outcomes, ..
            }
            | Self::RollbackFailed {
                outcomes, ..
            } => outcomes,
            _ => &[],
        }
    }

    /// Returns the run status recorded for this error.
    #[must_use]
    pub const fn run_status(&self) -> RunStatus {
        match self {
            Self::Resolve(_)
            | Self::CircuitOpen(_)
            | Self::MementoCapture(_)
            | Self::InterventionRequired {
                ..
            } => RunStatus::Rejected,
            Self::MigrationApply {
                ..
            } => RunStatus::RolledBack,
            Self::RollbackFailed {
                ..
            } => RunStatus::RollbackFailed,
            Self::Memento(_) | Self::Introspection(_) | Self::Integrity(_) | Self::Baseline(_) => {
                RunStatus::Succeeded
            }
        }
    }
}

// ============================================================================
// SECTION: Baseline Check
// ============================================================================

/// Comparison of the live schema against the recorded baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineCheck {
    /// No baseline has been recorded for the tenant.
    Missing,
    /// The live schema hashes to the recorded root.
    Matches(HashDigest),
    /// The live schema no longer hashes to the recorded root.
    Drifted {
        /// Recorded root.
        expected: HashDigest,
        /// Root of the live schema.
        actual: HashDigest,
    },
}

// ============================================================================
// SECTION: Runner Seam
// ============================================================================

/// Anything that can run a migration set to completion.
pub trait MigrationRunner {
    /// Runs the migrations and returns the report.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when the run is rejected or fails.
    fn run_migrations(
        &mut self,
        migrations: &[MigrationDescriptor],
    ) -> Result<ExecutionReport, ExecutionError>;
}

// ============================================================================
// SECTION: Migration Executor
// ============================================================================

/// Restore point held across a cancelled run.
#[derive(Debug, Clone)]
struct PendingRun {
    /// Restore point captured before the first migration.
    memento: MementoHandle,
    /// Migrations applied since the restore point.
    applied: Vec<MigrationId>,
}

/// Per-tenant migration executor.
pub struct MigrationExecutor<A, M, I, B, K> {
    /// Tenant served by this executor.
    tenant_id: TenantId,
    /// Host capabilities.
    caps: ExecutorCapabilities<A, M, I, B, K>,
    /// Audit sink for run events.
    audit: Arc<dyn AuditSink>,
    /// Configuration.
    config: ExecutorConfig,
    /// Breaker owned by this executor.
    breaker: CircuitBreaker,
    /// Migrations applied and not rolled back.
    applied: BTreeSet<MigrationId>,
    /// Restore point held after cancellation or a failed post-apply step.
    pending: Option<PendingRun>,
    /// Restore point whose restore failed; blocks every run while set.
    blocked: Option<MementoHandle>,
}

impl<A, M, I, B, K> MigrationExecutor<A, M, I, B, K>
where
    A: ApplyTarget,
    M: MementoProvider,
    I: SchemaIntrospector,
    B: BaselineStore,
    K: Clock,
{
    /// Creates an executor with a closed breaker.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        caps: ExecutorCapabilities<A, M, I, B, K>,
        audit: Arc<dyn AuditSink>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            tenant_id,
            caps,
            audit,
            config,
            breaker: CircuitBreaker::new(config.breaker),
            applied: BTreeSet::new(),
            pending: None,
            blocked: None,
        }
    }

    /// Returns the tenant identifier.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the breaker state.
    #[must_use]
    pub const fn breaker_state(&self) -> &CircuitState {
        self.breaker.state()
    }

    /// Returns the host capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &ExecutorCapabilities<A, M, I, B, K> {
        &self.caps
    }

    /// Returns true when `migration_id` was applied and not rolled back.
    #[must_use]
    pub fn is_applied(&self, migration_id: &MigrationId) -> bool {
        self.applied.contains(migration_id)
    }

    /// Returns the restore point held after a cancelled run.
    #[must_use]
    pub fn pending_memento(&self) -> Option<&MementoHandle> {
        self.pending.as_ref().map(|pending| &pending.memento)
    }

    /// Returns the restore point that must be resolved before the next run.
    #[must_use]
    pub const fn intervention_required(&self) -> Option<&MementoHandle> {
        self.blocked.as_ref()
    }

    /// Compares the live schema root with the tenant's recorded baseline.
    ///
    /// The tree is built with the baseline's own algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when the baseline cannot be loaded, the
    /// schema cannot be read, or the tree cannot be built.
    pub fn check_baseline(&self) -> Result<BaselineCheck, ExecutionError> {
        let Some(baseline) = self.caps.baselines.load(&self.tenant_id)? else {
            return Ok(BaselineCheck::Missing);
        };
        let snapshot = self.caps.introspector.current_schema()?;
        let actual = IntegrityTree::build_with(baseline.algorithm, &snapshot)?.root().clone();
        if actual == baseline.root {
            Ok(BaselineCheck::Matches(actual))
        } else {
            Ok(BaselineCheck::Drifted {
                expected: baseline.root,
                actual,
            })
        }
    }

    /// Runs the migration set.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when an earlier restore failed, the set
    /// cannot be resolved, the breaker is open, a migration fails, or
    /// post-apply integrity recording fails.
    pub fn execute(
        &mut self,
        migrations: &[MigrationDescriptor],
    ) -> Result<ExecutionReport, ExecutionError> {
        self.execute_with_cancel(migrations, &CancelFlag::new())
    }

    /// Runs the migration set, stopping between migrations once `cancel` is set.
    ///
    /// A cancelled run returns a `Cancelled` report that keeps the restore
    /// point. Call [`Self::rollback`] to undo it, or run again to resume.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] as for [`Self::execute`].
    pub fn execute_with_cancel(
        &mut self,
        migrations: &[MigrationDescriptor],
        cancel: &CancelFlag,
    ) -> Result<ExecutionReport, ExecutionError> {
        if let Some(memento) = self.blocked.clone() {
            return Err(self.reject(ExecutionError::InterventionRequired {
                memento,
            }));
        }
        let ordered = match resolve(migrations) {
            Ok(ordered) => ordered,
            Err(err) => return Err(self.reject(err.into())),
        };
        if let Err(err) = self.breaker.try_acquire(&self.caps.clock.now()) {
            return Err(self.reject(err.into()));
        }

        let mut pending = match self.pending.take() {
            Some(pending) => pending,
            None => match self.caps.memento.capture(self.caps.clock.now()) {
                Ok(memento) => PendingRun {
                    memento,
                    applied: Vec::new(),
                },
                Err(err) => {
                    self.breaker.record_failure(self.caps.clock.now());
                    return Err(self.reject(ExecutionError::MementoCapture(err)));
                }
            },
        };

        let mut outcomes = Vec::with_capacity(ordered.len());
        for (index, migration) in ordered.iter().enumerate() {
            if self.applied.contains(&migration.migration_id) {
                outcomes.push(ExecutionOutcome::skipped(
                    migration.migration_id.clone(),
                    "already applied",
                ));
                continue;
            }
            if cancel.is_cancelled() {
                skip_remaining(&mut outcomes, &ordered[index ..], "run cancelled");
                return Ok(self.cancelled(pending, outcomes));
            }

            let started = self.caps.clock.now();
            let result = self.caps.target.apply(migration);
            let duration_ms = self.caps.clock.now().millis_since(&started).unwrap_or(0);
            match result {
                Ok(()) => {
                    outcomes.push(ExecutionOutcome::applied(
                        migration.migration_id.clone(),
                        duration_ms,
                    ));
                    self.applied.insert(migration.migration_id.clone());
                    pending.applied.push(migration.migration_id.clone());
                }
                Err(err) => {
                    let reason = err.to_string();
                    outcomes.push(ExecutionOutcome::failed(
                        migration.migration_id.clone(),
                        duration_ms,
                        reason.clone(),
                    ));
                    let note = format!("not attempted after {} failed", migration.migration_id);
                    skip_remaining(&mut outcomes, &ordered[index + 1 ..], &note);
                    self.breaker.record_failure(self.caps.clock.now());
                    return Err(self.roll_back_failed_run(
                        pending,
                        migration.migration_id.clone(),
                        reason,
                        outcomes,
                    ));
                }
            }
        }

        self.breaker.record_success();
        self.complete(pending, outcomes)
    }

    /// Restores a held restore point and forgets the migrations it covers.
    ///
    /// A successful restore of a blocking restore point unblocks the executor.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Memento`] when the restore fails; the
    /// restore point stays held so the call can be retried.
    pub fn rollback(&mut self, memento: &MementoHandle) -> Result<(), ExecutionError> {
        self.caps.memento.restore(memento).map_err(ExecutionError::Memento)?;
        if self.blocked.as_ref() == Some(memento) {
            self.blocked = None;
        }
        if let Some(pending) = self.pending.take_if(|pending| pending.memento == *memento) {
            for migration_id in &pending.applied {
                self.applied.remove(migration_id);
            }
        }
        Ok(())
    }

    /// Releases a held restore point, keeping the applied migrations.
    ///
    /// Discarding a blocking restore point accepts the target's current state
    /// and unblocks the executor.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Memento`] when the release fails.
    pub fn discard(&mut self, memento: MementoHandle) -> Result<(), ExecutionError> {
        self.caps.memento.discard(&memento).map_err(ExecutionError::Memento)?;
        if self.blocked.as_ref() == Some(&memento) {
            self.blocked = None;
        }
        if self.pending.as_ref().is_some_and(|pending| pending.memento == memento) {
            self.pending = None;
        }
        Ok(())
    }

    /// Finishes a run whose migrations all succeeded.
    fn complete(
        &mut self,
        pending: PendingRun,
        outcomes: Vec<ExecutionOutcome>,
    ) -> Result<ExecutionReport, ExecutionError> {
        let baseline = if self.config.verify_integrity {
            match self.record_baseline() {
                Ok(baseline) => Some(baseline),
                Err(err) => {
                    self.pending = Some(pending);
                    self.audit_failure(&err, outcomes);
                    return Err(err);
                }
            }
        } else {
            None
        };

        if let Err(err) = self.caps.memento.discard(&pending.memento) {
            self.pending = Some(pending);
            let err = ExecutionError::Memento(err);
            self.audit_failure(&err, outcomes);
            return Err(err);
        }

        let mut event = ExecutionAuditEvent::new(
            self.tenant_id.clone(),
            RunStatus::Succeeded,
            outcomes.clone(),
            self.caps.clock.now(),
        );
        if let Some(baseline) = &baseline {
            event = event.with_root(baseline.root.clone());
        }
        self.audit.record_execution(&event);

        Ok(ExecutionReport {
            tenant_id: self.tenant_id.clone(),
            status: RunStatus::Succeeded,
            outcomes,
            baseline,
            pending_memento: None,
        })
    }

    /// Builds the integrity tree over the live schema and saves its root.
    fn record_baseline(&self) -> Result<IntegrityBaseline, ExecutionError> {
        let snapshot = self.caps.introspector.current_schema()?;
        let tree = IntegrityTree::build_with(self.config.hash_algorithm, &snapshot)?;
        let baseline = IntegrityBaseline {
            tenant_id: self.tenant_id.clone(),
            root: tree.root().clone(),
            algorithm: tree.algorithm(),
            table_count: tree.leaf_count(),
            recorded_at: self.caps.clock.now(),
        };
        self.caps.baselines.save(&baseline)?;
        Ok(baseline)
    }

    /// Restores the restore point after a failed migration.
    fn roll_back_failed_run(
        &mut self,
        pending: PendingRun,
        migration_id: MigrationId,
        reason: String,
        outcomes: Vec<ExecutionOutcome>,
    ) -> ExecutionError {
        let err = match self.caps.memento.restore(&pending.memento) {
            Ok(()) => {
                for applied in &pending.applied {
                    self.applied.remove(applied);
                }
                ExecutionError::MigrationApply {
                    migration_id,
                    reason,
                    outcomes,
                }
            }
            Err(restore) => {
                let memento = pending.memento.clone();
                self.blocked = Some(memento.clone());
                self.pending = Some(pending);
                ExecutionError::RollbackFailed {
                    migration_id,
                    reason: restore.to_string(),
                    outcomes,
                    memento,
                }
            }
        };
        self.audit_failure(&err, err.outcomes().to_vec());
        err
    }

    /// Holds the restore point and reports a cancelled run.
    fn cancelled(&mut self, pending: PendingRun, outcomes: Vec<ExecutionOutcome>) -> ExecutionReport {
        self.breaker.release_trial();
        let memento = pending.memento.clone();
        self.pending = Some(pending);
        self.audit.record_execution(&ExecutionAuditEvent::new(
            self.tenant_id.clone(),
            RunStatus::Cancelled,
            outcomes.clone(),
            self.caps.clock.now(),
        ));
        ExecutionReport {
            tenant_id: self.tenant_id.clone(),
            status: RunStatus::Cancelled,
            outcomes,
            baseline: None,
            pending_memento: Some(memento),
        }
    }

    /// Audits a run rejected before any migration was applied.
    fn reject(&self, err: ExecutionError) -> ExecutionError {
        self.audit_failure(&err, Vec::new());
        err
    }

    /// Records a failed or rejected run.
    fn audit_failure(&self, err: &ExecutionError, outcomes: Vec<ExecutionOutcome>) {
        self.audit.record_execution(
            &ExecutionAuditEvent::new(
                self.tenant_id.clone(),
                err.run_status(),
                outcomes,
                self.caps.clock.now(),
            )
            .with_error(err.to_string()),
        );
    }
}

impl<A, M, I, B, K> MigrationRunner for MigrationExecutor<A, M, I, B, K>
where
    A: ApplyTarget,
    M: MementoProvider,
    I: SchemaIntrospector,
    B: BaselineStore,
    K: Clock,
{
    fn run_migrations(
        &mut self,
        migrations: &[MigrationDescriptor],
    ) -> Result<ExecutionReport, ExecutionError> {
        self.execute(migrations)
    }
}

/// Appends skipped outcomes for migrations that will not run.
fn skip_remaining(outcomes: &mut Vec<ExecutionOutcome>, rest: &[MigrationDescriptor], reason: &str) {
    outcomes.extend(
        rest.iter()
            .map(|migration| ExecutionOutcome::skipped(migration.migration_id.clone(), reason)),
    );
}
