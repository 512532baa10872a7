// crates/schema-gate-core/src/audit.rs
// ============================================================================
// Module: Schema Gate Audit Logging
// Description: Structured audit events for migration runs and workflow transitions.
// Purpose: Emit JSON-lines audit records without a hard logging dependency.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! The executor and the provisioning workflow report what they did through
//! an [`AuditSink`]. Events are plain serializable records; sinks decide
//! where they go. Sink failures never affect the operation being audited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;

use crate::core::ExecutionOutcome;
use crate::core::HashDigest;
use crate::core::PlaceId;
use crate::core::RunStatus;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::core::TransitionId;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Event label for executor runs.
pub const EXECUTION_EVENT: &str = "migration_run";
/// Event label for workflow transitions.
pub const TRANSITION_EVENT: &str = "workflow_transition";

/// Audit record for one executor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAuditEvent {
    /// Event identifier.
    pub event: String,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Run status.
    pub status: RunStatus,
    /// Per-migration outcomes in resolved order.
    pub outcomes: Vec<ExecutionOutcome>,
    /// Integrity root recorded by a successful run.
    pub root: Option<HashDigest>,
    /// Failure detail for unsuccessful runs.
    pub error: Option<String>,
    /// Time the run finished.
    pub recorded_at: Timestamp,
}

impl ExecutionAuditEvent {
    /// Creates a run event.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        status: RunStatus,
        outcomes: Vec<ExecutionOutcome>,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            event: EXECUTION_EVENT.to_string(),
            tenant_id,
            status,
            outcomes,
            root: None,
            error: None,
            recorded_at,
        }
    }

    /// Attaches the recorded integrity root.
    #[must_use]
    pub fn with_root(mut self, root: HashDigest) -> Self {
        self.root = Some(root);
        self
    }

    /// Attaches a failure detail.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Audit record for one fired workflow transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionAuditEvent {
    /// Event identifier.
    pub event: String,
    /// Fired transition.
    pub transition_id: TransitionId,
    /// Firing sequence number within the workflow run, starting at 1.
    pub sequence: u64,
    /// Marking before firing.
    pub marking_before: BTreeMap<PlaceId, u32>,
    /// Marking after firing.
    pub marking_after: BTreeMap<PlaceId, u32>,
}

impl TransitionAuditEvent {
    /// Creates a transition event.
    #[must_use]
    pub fn new(
        transition_id: TransitionId,
        sequence: u64,
        marking_before: BTreeMap<PlaceId, u32>,
        marking_after: BTreeMap<PlaceId, u32>,
    ) -> Self {
        Self {
            event: TRANSITION_EVENT.to_string(),
            transition_id,
            sequence,
            marking_before,
            marking_after,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for executor and workflow events.
pub trait AuditSink: Send + Sync {
    /// Records an executor run.
    fn record_execution(&self, event: &ExecutionAuditEvent);

    /// Records a fired transition.
    fn record_transition(&self, _event: &TransitionAuditEvent) {}
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_execution(&self, event: &ExecutionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }

    fn record_transition(&self, event: &TransitionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one serialized line.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_execution(&self, event: &ExecutionAuditEvent) {
        self.write_line(event);
    }

    fn record_transition(&self, event: &TransitionAuditEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_execution(&self, _event: &ExecutionAuditEvent) {}

    fn record_transition(&self, _event: &TransitionAuditEvent) {}
}

/// Captured audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditRecord {
    /// Executor run.
    Execution(ExecutionAuditEvent),
    /// Workflow transition.
    Transition(TransitionAuditEvent),
}

/// Audit sink that keeps events in memory, for tests and embedding hosts.
#[derive(Default)]
pub struct InMemoryAuditSink {
    /// Captured records in arrival order.
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every captured record in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }

    /// Returns captured executor runs.
    #[must_use]
    pub fn executions(&self) -> Vec<ExecutionAuditEvent> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                AuditRecord::Execution(event) => Some(event),
                AuditRecord::Transition(_) => None,
            })
            .collect()
    }

    /// Returns captured workflow transitions.
    #[must_use]
    pub fn transitions(&self) -> Vec<TransitionAuditEvent> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                AuditRecord::Transition(event) => Some(event),
                AuditRecord::Execution(_) => None,
            })
            .collect()
    }

    /// Appends one record.
    fn push(&self, record: AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record_execution(&self, event: &ExecutionAuditEvent) {
        self.push(AuditRecord::Execution(event.clone()));
    }

    fn record_transition(&self, event: &TransitionAuditEvent) {
        self.push(AuditRecord::Transition(event.clone()));
    }
}
