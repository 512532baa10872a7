// crates/schema-gate-core/tests/executor.rs
// ============================================================================
// Module: Migration Executor Tests
// Description: Rollback, breaker gating, cancellation, and baseline recording.
// ============================================================================
//! ## Overview
//! Drives the executor against scripted fakes so every run path is observable:
//! which migrations reached the target, which restore points were taken, and
//! which audit events were written.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use schema_gate_core::ApplyError;
use schema_gate_core::ApplyTarget;
use schema_gate_core::BaselineCheck;
use schema_gate_core::BaselineStore;
use schema_gate_core::BreakerConfig;
use schema_gate_core::CancelFlag;
use schema_gate_core::CircuitStatus;
use schema_gate_core::ColumnDescriptor;
use schema_gate_core::ExecutionError;
use schema_gate_core::ExecutorCapabilities;
use schema_gate_core::ExecutorConfig;
use schema_gate_core::InMemoryAuditSink;
use schema_gate_core::InMemoryBaselineStore;
use schema_gate_core::InMemoryMementoProvider;
use schema_gate_core::IntegrityBaseline;
use schema_gate_core::IntegrityTree;
use schema_gate_core::IntrospectionError;
use schema_gate_core::ManualClock;
use schema_gate_core::MementoError;
use schema_gate_core::MementoHandle;
use schema_gate_core::MementoProvider;
use schema_gate_core::MigrationDescriptor;
use schema_gate_core::MigrationExecutor;
use schema_gate_core::MigrationId;
use schema_gate_core::MigrationKind;
use schema_gate_core::MigrationRunner;
use schema_gate_core::OutcomeStatus;
use schema_gate_core::RunStatus;
use schema_gate_core::SchemaIntrospector;
use schema_gate_core::SchemaSnapshot;
use schema_gate_core::TableSchema;
use schema_gate_core::TenantId;
use schema_gate_core::Timestamp;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Target that records calls and fails chosen migrations.
#[derive(Default)]
struct ScriptedTarget {
    calls: Mutex<Vec<String>>,
    failing: Mutex<BTreeSet<String>>,
    cancel_after: Mutex<Option<(String, CancelFlag)>>,
}

impl ScriptedTarget {
    fn failing(ids: &[&str]) -> Self {
        let target = Self::default();
        target.failing.lock().unwrap().extend(ids.iter().map(ToString::to_string));
        target
    }

    fn heal(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }

    fn cancel_after(&self, id: &str, flag: &CancelFlag) {
        *self.cancel_after.lock().unwrap() = Some((id.to_string(), flag.clone()));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ApplyTarget for ScriptedTarget {
    fn apply(&self, migration: &MigrationDescriptor) -> Result<(), ApplyError> {
        let id = migration.migration_id.as_str().to_string();
        self.calls.lock().unwrap().push(id.clone());
        if let Some((after, flag)) = self.cancel_after.lock().unwrap().as_ref()
            && *after == id
        {
            flag.cancel();
        }
        if self.failing.lock().unwrap().contains(&id) {
            return Err(ApplyError::Failed(format!("{id} rejected by target")));
        }
        Ok(())
    }
}

/// Introspector returning a fixed snapshot, or failing when unset.
struct FixedSchema(Option<SchemaSnapshot>);

impl SchemaIntrospector for FixedSchema {
    fn current_schema(&self) -> Result<SchemaSnapshot, IntrospectionError> {
        self.0.clone().ok_or_else(|| IntrospectionError::Unavailable("offline".to_string()))
    }
}

/// Memento provider whose capture or restore can be made to fail.
#[derive(Default)]
struct FlakyMemento {
    inner: InMemoryMementoProvider,
    fail_capture: bool,
    fail_restore: AtomicBool,
}

impl FlakyMemento {
    fn failing_restore() -> Self {
        Self {
            fail_restore: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn repair_restore(&self) {
        self.fail_restore.store(false, Ordering::SeqCst);
    }
}

impl MementoProvider for FlakyMemento {
    fn capture(&self, at: Timestamp) -> Result<MementoHandle, MementoError> {
        if self.fail_capture {
            return Err(MementoError::Capture("backup volume full".to_string()));
        }
        self.inner.capture(at)
    }

    fn restore(&self, handle: &MementoHandle) -> Result<(), MementoError> {
        if self.fail_restore.load(Ordering::SeqCst) {
            return Err(MementoError::Restore("backup unreadable".to_string()));
        }
        self.inner.restore(handle)
    }

    fn discard(&self, handle: &MementoHandle) -> Result<(), MementoError> {
        self.inner.discard(handle)
    }
}

type TestExecutor =
    MigrationExecutor<ScriptedTarget, FlakyMemento, FixedSchema, InMemoryBaselineStore, ManualClock>;

struct Harness {
    executor: TestExecutor,
    audit: Arc<InMemoryAuditSink>,
    clock: ManualClock,
    baselines: InMemoryBaselineStore,
}

fn schema() -> SchemaSnapshot {
    SchemaSnapshot::new(vec![
        TableSchema::new("accounts", vec![ColumnDescriptor::new("id", "integer")]),
        TableSchema::new("parties", vec![ColumnDescriptor::new("id", "integer")]),
    ])
    .unwrap()
}

fn harness_with(target: ScriptedTarget, memento: FlakyMemento, config: ExecutorConfig) -> Harness {
    let audit = Arc::new(InMemoryAuditSink::new());
    let clock = ManualClock::logical();
    let baselines = InMemoryBaselineStore::new();
    let executor = MigrationExecutor::new(
        TenantId::new("tenant-1"),
        ExecutorCapabilities {
            target,
            memento,
            introspector: FixedSchema(Some(schema())),
            baselines: baselines.clone(),
            clock: clock.clone(),
        },
        audit.clone(),
        config,
    );
    Harness {
        executor,
        audit,
        clock,
        baselines,
    }
}

fn harness(target: ScriptedTarget) -> Harness {
    harness_with(target, FlakyMemento::default(), ExecutorConfig::default())
}

fn migration(id: &str, deps: &[&str]) -> MigrationDescriptor {
    MigrationDescriptor::new(id, MigrationKind::Module).depends_on(deps.iter().copied())
}

fn statuses(outcomes: &[schema_gate_core::ExecutionOutcome]) -> Vec<(&str, OutcomeStatus)> {
    outcomes.iter().map(|outcome| (outcome.migration_id.as_str(), outcome.status)).collect()
}

// ============================================================================
// SECTION: Successful Runs
// ============================================================================

#[test]
fn successful_run_applies_in_order_and_records_baseline() {
    let mut h = harness(ScriptedTarget::default());
    let set = vec![migration("b_parties", &["a_accounts"]), migration("a_accounts", &[])];

    let report = h.executor.execute(&set).unwrap();

    assert!(report.succeeded());
    assert_eq!(
        statuses(&report.outcomes),
        vec![("a_accounts", OutcomeStatus::Applied), ("b_parties", OutcomeStatus::Applied)]
    );
    assert_eq!(h.executor.capabilities().target.calls(), vec!["a_accounts", "b_parties"]);

    let expected_root = IntegrityTree::build(&schema()).unwrap().root().clone();
    let baseline = report.baseline.unwrap();
    assert_eq!(baseline.root, expected_root);
    assert_eq!(baseline.table_count, 2);
    assert_eq!(h.baselines.load(&TenantId::new("tenant-1")).unwrap(), Some(baseline));

    let ledger = h.executor.capabilities().memento.inner.ledger();
    assert_eq!(ledger.captured.len(), 1);
    assert_eq!(ledger.discarded, ledger.captured);
    assert!(ledger.restored.is_empty());

    let events = h.audit.executions();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, RunStatus::Succeeded);
    assert_eq!(events[0].root, Some(expected_root));
    assert_eq!(h.executor.breaker_state().status, CircuitStatus::Closed);
}

#[test]
fn integrity_recording_can_be_disabled() {
    let config = ExecutorConfig {
        verify_integrity: false,
        ..ExecutorConfig::default()
    };
    let mut h = harness_with(ScriptedTarget::default(), FlakyMemento::default(), config);
    let report = h.executor.execute(&[migration("a", &[])]).unwrap();
    assert!(report.baseline.is_none());
    assert_eq!(h.baselines.load(&TenantId::new("tenant-1")).unwrap(), None);
}

#[test]
fn applied_migrations_are_skipped_on_the_next_run() {
    let mut h = harness(ScriptedTarget::default());
    h.executor.execute(&[migration("a", &[])]).unwrap();
    let report = h.executor.execute(&[migration("a", &[]), migration("b", &["a"])]).unwrap();
    assert_eq!(statuses(&report.outcomes), vec![("a", OutcomeStatus::Skipped), ("b", OutcomeStatus::Applied)]);
    assert_eq!(report.outcomes[0].error.as_deref(), Some("already applied"));
    assert_eq!(h.executor.capabilities().target.calls(), vec!["a", "b"]);
}

#[test]
fn executor_runs_through_the_runner_seam() {
    let mut h = harness(ScriptedTarget::default());
    let runner: &mut dyn MigrationRunner = &mut h.executor;
    let report = runner.run_migrations(&[migration("only", &[])]).unwrap();
    assert_eq!(report.tenant_id, TenantId::new("tenant-1"));
    assert!(report.pending_memento.is_none());
}

// ============================================================================
// SECTION: Failure and Rollback
// ============================================================================

#[test]
fn failed_migration_restores_the_memento() {
    let mut h = harness(ScriptedTarget::failing(&["b"]));
    let set = vec![migration("a", &[]), migration("b", &["a"]), migration("c", &["b"])];

    let err = h.executor.execute(&set).unwrap_err();

    let ExecutionError::MigrationApply {
        migration_id,
        outcomes,
        reason,
    } = &err
    else {
        panic!("expected MigrationApply, got {err:?}");
    };
    assert_eq!(migration_id, &MigrationId::new("b"));
    assert!(reason.contains("rejected by target"));
    assert_eq!(
        statuses(outcomes),
        vec![("a", OutcomeStatus::Applied), ("b", OutcomeStatus::Failed), ("c", OutcomeStatus::Skipped)]
    );
    assert_eq!(h.executor.capabilities().target.calls(), vec!["a", "b"]);
    assert!(!h.executor.is_applied(&MigrationId::new("a")));

    let ledger = h.executor.capabilities().memento.inner.ledger();
    assert_eq!(ledger.restored, ledger.captured);
    assert!(ledger.discarded.is_empty());

    assert_eq!(h.executor.breaker_state().consecutive_failures, 1);
    assert_eq!(h.baselines.load(&TenantId::new("tenant-1")).unwrap(), None);

    let events = h.audit.executions();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, RunStatus::RolledBack);
    assert!(events[0].error.as_deref().unwrap().contains('b'));
    assert_eq!(events[0].outcomes.len(), 3);
}

#[test]
fn failed_restore_is_reported_and_memento_kept() {
    let mut h = harness_with(
        ScriptedTarget::failing(&["a"]),
        FlakyMemento::failing_restore(),
        ExecutorConfig::default(),
    );

    let err = h.executor.execute(&[migration("a", &[])]).unwrap_err();

    let ExecutionError::RollbackFailed {
        migration_id,
        memento,
        ..
    } = &err
    else {
        panic!("expected RollbackFailed, got {err:?}");
    };
    assert_eq!(migration_id, &MigrationId::new("a"));
    assert_eq!(h.executor.pending_memento(), Some(memento));
    assert_eq!(err.run_status(), RunStatus::RollbackFailed);
    assert_eq!(h.audit.executions()[0].status, RunStatus::RollbackFailed);
    assert_eq!(h.executor.intervention_required(), Some(memento));
}

#[test]
fn failed_restore_blocks_runs_until_rolled_back() {
    let mut h = harness_with(
        ScriptedTarget::failing(&["b"]),
        FlakyMemento::failing_restore(),
        ExecutorConfig::default(),
    );
    let set = vec![migration("a", &[]), migration("b", &["a"])];
    let err = h.executor.execute(&set).unwrap_err();
    let ExecutionError::RollbackFailed {
        memento,
        ..
    } = &err
    else {
        panic!("expected RollbackFailed, got {err:?}");
    };
    let held = memento.clone();

    h.executor.capabilities().target.heal("b");
    for _ in 0 .. 3 {
        let err = h.executor.execute(&set).unwrap_err();
        let ExecutionError::InterventionRequired {
            memento,
        } = &err
        else {
            panic!("expected InterventionRequired, got {err:?}");
        };
        assert_eq!(memento, &held);
        assert_eq!(err.run_status(), RunStatus::Rejected);
    }
    assert_eq!(h.executor.capabilities().target.calls(), vec!["a", "b"]);
    assert_eq!(h.executor.breaker_state().consecutive_failures, 1);
    assert_eq!(h.baselines.load(&TenantId::new("tenant-1")).unwrap(), None);
    assert_eq!(h.audit.executions().last().unwrap().status, RunStatus::Rejected);

    h.executor.rollback(&held).unwrap_err();
    assert_eq!(h.executor.intervention_required(), Some(&held));

    h.executor.capabilities().memento.repair_restore();
    h.executor.rollback(&held).unwrap();
    assert!(h.executor.intervention_required().is_none());
    assert!(h.executor.pending_memento().is_none());
    assert!(!h.executor.is_applied(&MigrationId::new("a")));

    let report = h.executor.execute(&set).unwrap();
    assert_eq!(statuses(&report.outcomes), vec![("a", OutcomeStatus::Applied), ("b", OutcomeStatus::Applied)]);
    assert_eq!(h.executor.capabilities().target.calls(), vec!["a", "b", "a", "b"]);
}

#[test]
fn discarding_the_blocking_memento_accepts_the_current_state() {
    let mut h = harness_with(
        ScriptedTarget::failing(&["b"]),
        FlakyMemento::failing_restore(),
        ExecutorConfig::default(),
    );
    let set = vec![migration("a", &[]), migration("b", &["a"])];
    h.executor.execute(&set).unwrap_err();
    let held = h.executor.intervention_required().cloned().unwrap();

    h.executor.discard(held.clone()).unwrap();

    assert!(h.executor.intervention_required().is_none());
    assert!(h.executor.pending_memento().is_none());
    assert_eq!(h.executor.capabilities().memento.inner.ledger().discarded, vec![held]);
    h.executor.capabilities().target.heal("b");
    let report = h.executor.execute(&set).unwrap();
    assert_eq!(statuses(&report.outcomes), vec![("a", OutcomeStatus::Skipped), ("b", OutcomeStatus::Applied)]);
}

#[test]
fn capture_failure_rejects_the_run_before_applying() {
    let memento = FlakyMemento {
        fail_capture: true,
        ..FlakyMemento::default()
    };
    let mut h = harness_with(ScriptedTarget::default(), memento, ExecutorConfig::default());

    let err = h.executor.execute(&[migration("a", &[])]).unwrap_err();

    assert!(matches!(err, ExecutionError::MementoCapture(_)));
    assert!(h.executor.capabilities().target.calls().is_empty());
    assert_eq!(h.executor.breaker_state().consecutive_failures, 1);
    assert_eq!(h.audit.executions()[0].status, RunStatus::Rejected);
}

#[test]
fn resolution_errors_touch_nothing_and_do_not_trip_the_breaker() {
    let mut h = harness(ScriptedTarget::default());
    let cyclic = vec![migration("a", &["b"]), migration("b", &["a"])];
    for _ in 0 .. 10 {
        assert!(matches!(h.executor.execute(&cyclic), Err(ExecutionError::Resolve(_))));
    }
    assert_eq!(h.executor.breaker_state().status, CircuitStatus::Closed);
    assert_eq!(h.executor.breaker_state().consecutive_failures, 0);
    assert!(h.executor.capabilities().memento.inner.ledger().captured.is_empty());
    assert!(h.executor.capabilities().target.calls().is_empty());
    assert_eq!(h.audit.executions().len(), 10);
}

#[test]
fn post_apply_introspection_failure_keeps_the_memento() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let mut executor = MigrationExecutor::new(
        TenantId::new("tenant-2"),
        ExecutorCapabilities {
            target: ScriptedTarget::default(),
            memento: InMemoryMementoProvider::new(),
            introspector: FixedSchema(None),
            baselines: InMemoryBaselineStore::new(),
            clock: ManualClock::logical(),
        },
        audit,
        ExecutorConfig::default(),
    );

    let err = executor.execute(&[migration("a", &[])]).unwrap_err();

    assert!(matches!(err, ExecutionError::Introspection(_)));
    assert!(executor.is_applied(&MigrationId::new("a")));
    let held = executor.pending_memento().cloned().unwrap();
    executor.discard(held).unwrap();
    assert!(executor.pending_memento().is_none());
    assert!(executor.is_applied(&MigrationId::new("a")));
}

// ============================================================================
// SECTION: Baseline Check
// ============================================================================

#[test]
fn baseline_check_reports_missing_match_and_drift() {
    let mut h = harness(ScriptedTarget::default());
    assert_eq!(h.executor.check_baseline().unwrap(), BaselineCheck::Missing);

    h.executor.execute(&[migration("a", &[])]).unwrap();
    let live_root = IntegrityTree::build(&schema()).unwrap().root().clone();
    assert_eq!(h.executor.check_baseline().unwrap(), BaselineCheck::Matches(live_root.clone()));

    let other = SchemaSnapshot::new(vec![TableSchema::new(
        "accounts",
        vec![ColumnDescriptor::new("id", "uuid")],
    )])
    .unwrap();
    let other_tree = IntegrityTree::build(&other).unwrap();
    h.baselines
        .save(&IntegrityBaseline {
            tenant_id: TenantId::new("tenant-1"),
            root: other_tree.root().clone(),
            algorithm: other_tree.algorithm(),
            table_count: other_tree.leaf_count(),
            recorded_at: Timestamp::Logical(9),
        })
        .unwrap();

    assert_eq!(
        h.executor.check_baseline().unwrap(),
        BaselineCheck::Drifted {
            expected: other_tree.root().clone(),
            actual: live_root,
        }
    );
}

#[test]
fn baseline_check_surfaces_introspection_failures() {
    let baselines = InMemoryBaselineStore::new();
    let tree = IntegrityTree::build(&schema()).unwrap();
    baselines
        .save(&IntegrityBaseline {
            tenant_id: TenantId::new("tenant-3"),
            root: tree.root().clone(),
            algorithm: tree.algorithm(),
            table_count: tree.leaf_count(),
            recorded_at: Timestamp::Logical(1),
        })
        .unwrap();
    let executor = MigrationExecutor::new(
        TenantId::new("tenant-3"),
        ExecutorCapabilities {
            target: ScriptedTarget::default(),
            memento: InMemoryMementoProvider::new(),
            introspector: FixedSchema(None),
            baselines,
            clock: ManualClock::logical(),
        },
        Arc::new(InMemoryAuditSink::new()),
        ExecutorConfig::default(),
    );
    assert!(matches!(executor.check_baseline(), Err(ExecutionError::Introspection(_))));
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

#[test]
fn five_failed_runs_open_the_breaker_for_the_sixth() {
    let mut h = harness(ScriptedTarget::failing(&["b"]));
    let set = vec![migration("a", &[]), migration("b", &["a"])];

    for _ in 0 .. 5 {
        assert!(matches!(h.executor.execute(&set), Err(ExecutionError::MigrationApply { .. })));
    }
    assert_eq!(h.executor.breaker_state().status, CircuitStatus::Open);
    let calls_before = h.executor.capabilities().target.calls().len();
    let captures_before = h.executor.capabilities().memento.inner.ledger().captured.len();

    h.clock.advance(1_000);
    let err = h.executor.execute(&set).unwrap_err();

    let ExecutionError::CircuitOpen(rejection) = &err else {
        panic!("expected CircuitOpen, got {err:?}");
    };
    assert_eq!(rejection.consecutive_failures, 5);
    assert_eq!(rejection.retry_after_ms, Some(59_000));
    assert_eq!(h.executor.capabilities().target.calls().len(), calls_before);
    assert_eq!(h.executor.capabilities().memento.inner.ledger().captured.len(), captures_before);
    assert_eq!(h.audit.executions().last().unwrap().status, RunStatus::Rejected);
}

#[test]
fn trial_after_cool_down_closes_the_breaker_on_success() {
    let config = ExecutorConfig {
        breaker: BreakerConfig {
            failure_threshold: 2,
            reset_timeout_ms: 500,
        },
        ..ExecutorConfig::default()
    };
    let mut h = harness_with(ScriptedTarget::failing(&["a"]), FlakyMemento::default(), config);
    let set = vec![migration("a", &[])];
    h.executor.execute(&set).unwrap_err();
    h.executor.execute(&set).unwrap_err();
    assert_eq!(h.executor.breaker_state().status, CircuitStatus::Open);

    h.executor.capabilities().target.heal("a");
    h.clock.advance(500);
    h.executor.execute(&set).unwrap();
    assert_eq!(h.executor.breaker_state().status, CircuitStatus::Closed);
    assert_eq!(h.executor.breaker_state().consecutive_failures, 0);
}

#[test]
fn failed_trial_reopens_the_breaker() {
    let config = ExecutorConfig {
        breaker: BreakerConfig {
            failure_threshold: 1,
            reset_timeout_ms: 500,
        },
        ..ExecutorConfig::default()
    };
    let mut h = harness_with(ScriptedTarget::failing(&["a"]), FlakyMemento::default(), config);
    let set = vec![migration("a", &[])];
    h.executor.execute(&set).unwrap_err();
    h.clock.advance(500);
    assert!(matches!(h.executor.execute(&set), Err(ExecutionError::MigrationApply { .. })));
    assert_eq!(h.executor.breaker_state().status, CircuitStatus::Open);
    assert!(matches!(h.executor.execute(&set), Err(ExecutionError::CircuitOpen(_))));
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

#[test]
fn cancelled_run_keeps_memento_and_resumes() {
    let mut h = harness(ScriptedTarget::default());
    let cancel = CancelFlag::new();
    h.executor.capabilities().target.cancel_after("a", &cancel);
    let set = vec![migration("a", &[]), migration("b", &["a"]), migration("c", &["b"])];

    let report = h.executor.execute_with_cancel(&set, &cancel).unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(
        statuses(&report.outcomes),
        vec![("a", OutcomeStatus::Applied), ("b", OutcomeStatus::Skipped), ("c", OutcomeStatus::Skipped)]
    );
    let held = report.pending_memento.clone().unwrap();
    assert_eq!(h.executor.pending_memento(), Some(&held));
    assert_eq!(h.audit.executions()[0].status, RunStatus::Cancelled);

    let resumed = h.executor.execute(&set).unwrap();
    assert_eq!(
        statuses(&resumed.outcomes),
        vec![("a", OutcomeStatus::Skipped), ("b", OutcomeStatus::Applied), ("c", OutcomeStatus::Applied)]
    );
    assert_eq!(h.executor.capabilities().target.calls(), vec!["a", "b", "c"]);
    let ledger = h.executor.capabilities().memento.inner.ledger();
    assert_eq!(ledger.captured, vec![held.clone()]);
    assert_eq!(ledger.discarded, vec![held]);
    assert!(h.executor.pending_memento().is_none());
}

#[test]
fn cancelled_run_can_be_rolled_back() {
    let mut h = harness(ScriptedTarget::default());
    let cancel = CancelFlag::new();
    h.executor.capabilities().target.cancel_after("a", &cancel);
    let set = vec![migration("a", &[]), migration("b", &["a"])];

    let report = h.executor.execute_with_cancel(&set, &cancel).unwrap();
    let held = report.pending_memento.unwrap();
    h.executor.rollback(&held).unwrap();

    assert!(h.executor.pending_memento().is_none());
    assert!(!h.executor.is_applied(&MigrationId::new("a")));
    assert_eq!(h.executor.capabilities().memento.inner.ledger().restored, vec![held]);

    let rerun = h.executor.execute(&set).unwrap();
    assert_eq!(statuses(&rerun.outcomes), vec![("a", OutcomeStatus::Applied), ("b", OutcomeStatus::Applied)]);
    assert_eq!(h.executor.capabilities().memento.inner.ledger().captured.len(), 2);
}

#[test]
fn cancel_before_start_applies_nothing() {
    let mut h = harness(ScriptedTarget::default());
    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = h.executor.execute_with_cancel(&[migration("a", &[])], &cancel).unwrap();
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.outcomes[0].error.as_deref(), Some("run cancelled"));
    assert!(h.executor.capabilities().target.calls().is_empty());
    assert_eq!(h.executor.breaker_state().status, CircuitStatus::Closed);
}
