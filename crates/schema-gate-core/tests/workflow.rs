// crates/schema-gate-core/tests/workflow.rs
// ============================================================================
// Module: Provisioning Workflow Tests
// Description: Atomic firing, net validation, and the standard provisioning net.
// ============================================================================
//! ## Overview
//! Covers the generic firing rule on small nets and then drives the standard
//! tenant provisioning net end to end through a real migration executor.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use schema_gate_core::ApplyError;
use schema_gate_core::ApplyTarget;
use schema_gate_core::EffectError;
use schema_gate_core::ExecutionReport;
use schema_gate_core::ExecutorCapabilities;
use schema_gate_core::ExecutorConfig;
use schema_gate_core::InMemoryAuditSink;
use schema_gate_core::InMemoryBaselineStore;
use schema_gate_core::InMemoryMementoProvider;
use schema_gate_core::IntrospectionError;
use schema_gate_core::ManualClock;
use schema_gate_core::MigrationDescriptor;
use schema_gate_core::MigrationExecutor;
use schema_gate_core::MigrationHost;
use schema_gate_core::MigrationKind;
use schema_gate_core::MigrationRunner;
use schema_gate_core::NoopAuditSink;
use schema_gate_core::PlaceId;
use schema_gate_core::ProvisioningWorkflow;
use schema_gate_core::SchemaIntrospector;
use schema_gate_core::SchemaSnapshot;
use schema_gate_core::TenantId;
use schema_gate_core::TransitionId;
use schema_gate_core::TransitionSpec;
use schema_gate_core::WorkflowError;
use schema_gate_core::WorkflowNet;
use schema_gate_core::runtime::provisioning;
use schema_gate_core::runtime::provisioning::ProvisioningHost;

// ============================================================================
// SECTION: Generic Nets
// ============================================================================

#[derive(Debug, Default)]
struct Counter {
    effects: u32,
    allow: bool,
}

fn place(name: &str) -> PlaceId {
    PlaceId::new(name)
}

fn transition(name: &str) -> TransitionId {
    TransitionId::new(name)
}

fn two_step_net() -> WorkflowNet<Counter> {
    WorkflowNet::builder()
        .place("start")
        .place("middle")
        .place("end")
        .transition(TransitionSpec::new("advance").input("start").output("middle").effect(
            |ctx: &mut Counter| -> Result<(), EffectError> {
                ctx.effects += 1;
                Ok(())
            },
        ))
        .transition(
            TransitionSpec::new("finish")
                .input("middle")
                .output("end")
                .guard(|ctx: &Counter| ctx.allow)
                .effect(|_: &mut Counter| -> Result<(), EffectError> {
                    Err(EffectError::new("finish hook failed"))
                }),
        )
        .build()
        .unwrap()
}

fn run(net: WorkflowNet<Counter>, audit: Arc<InMemoryAuditSink>) -> ProvisioningWorkflow<Counter> {
    ProvisioningWorkflow::new(net, [(place("start"), 1)], audit).unwrap()
}

#[test]
fn firing_moves_tokens_and_audits_both_markings() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let mut workflow = run(two_step_net(), audit.clone());
    let mut ctx = Counter::default();

    let receipt = workflow.fire(&transition("advance"), &mut ctx).unwrap();

    assert_eq!(receipt.sequence, 1);
    assert_eq!(workflow.tokens(&place("start")), 0);
    assert_eq!(workflow.tokens(&place("middle")), 1);
    assert_eq!(receipt.marking, *workflow.marking());
    assert_eq!(ctx.effects, 1);

    let events = audit.transitions();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].transition_id, transition("advance"));
    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[0].marking_before[&place("start")], 1);
    assert_eq!(events[0].marking_after[&place("middle")], 1);
}

#[test]
fn disabled_transition_reports_missing_places() {
    let mut workflow = run(two_step_net(), Arc::new(InMemoryAuditSink::new()));
    let before = workflow.marking().clone();
    let err = workflow.fire(&transition("finish"), &mut Counter::default()).unwrap_err();
    assert_eq!(
        err,
        WorkflowError::NotEnabled {
            transition: transition("finish"),
            missing: vec![place("middle")],
        }
    );
    assert!(err.to_string().contains("middle"));
    assert_eq!(*workflow.marking(), before);
}

#[test]
fn guard_rejection_leaves_marking_and_context_untouched() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let mut workflow = run(two_step_net(), audit.clone());
    let mut ctx = Counter::default();
    workflow.fire(&transition("advance"), &mut ctx).unwrap();
    let before = workflow.marking().clone();

    let err = workflow.fire(&transition("finish"), &mut ctx).unwrap_err();

    assert_eq!(err, WorkflowError::GuardRejected(transition("finish")));
    assert_eq!(*workflow.marking(), before);
    assert_eq!(audit.transitions().len(), 1);
}

#[test]
fn effect_failure_leaves_marking_unchanged() {
    let mut workflow = run(two_step_net(), Arc::new(InMemoryAuditSink::new()));
    let mut ctx = Counter {
        allow: true,
        ..Counter::default()
    };
    workflow.fire(&transition("advance"), &mut ctx).unwrap();
    let before = workflow.marking().clone();

    let err = workflow.fire(&transition("finish"), &mut ctx).unwrap_err();

    assert_eq!(
        err,
        WorkflowError::EffectFailed {
            transition: transition("finish"),
            reason: "finish hook failed".to_string(),
        }
    );
    assert_eq!(*workflow.marking(), before);
    assert!(workflow.is_enabled(&transition("finish")));
}

#[test]
fn unknown_transition_is_rejected() {
    let mut workflow = run(two_step_net(), Arc::new(InMemoryAuditSink::new()));
    assert_eq!(
        workflow.fire(&transition("teleport"), &mut Counter::default()).unwrap_err(),
        WorkflowError::UnknownTransition(transition("teleport"))
    );
    assert!(!workflow.is_enabled(&transition("teleport")));
}

fn join_net() -> WorkflowNet<Counter> {
    WorkflowNet::builder()
        .place("schema_ready")
        .place("data_ready")
        .place("ready")
        .transition(TransitionSpec::new("join").input("schema_ready").input("data_ready").output("ready"))
        .build()
        .unwrap()
}

#[test]
fn join_waits_for_every_input() {
    let mut workflow =
        ProvisioningWorkflow::new(join_net(), [(place("schema_ready"), 1)], Arc::new(NoopAuditSink)).unwrap();
    assert!(workflow.enabled_transitions().is_empty());
    assert!(workflow.fire(&transition("join"), &mut Counter::default()).is_err());
    assert_eq!(workflow.tokens(&place("schema_ready")), 1);
}

#[test]
fn join_consumes_one_token_from_each_input() {
    let mut workflow = ProvisioningWorkflow::new(
        join_net(),
        [(place("schema_ready"), 2), (place("data_ready"), 1)],
        Arc::new(NoopAuditSink),
    )
    .unwrap();
    workflow.fire(&transition("join"), &mut Counter::default()).unwrap();
    assert_eq!(workflow.tokens(&place("schema_ready")), 1);
    assert_eq!(workflow.tokens(&place("data_ready")), 0);
    assert!(workflow.is_marked(&place("ready")));
}

#[test]
fn repeated_input_arc_needs_as_many_tokens() {
    let net: WorkflowNet<Counter> = WorkflowNet::builder()
        .place("slots")
        .place("pair")
        .transition(TransitionSpec::new("pair_up").input("slots").input("slots").output("pair"))
        .build()
        .unwrap();
    let mut workflow =
        ProvisioningWorkflow::new(net, [(place("slots"), 1)], Arc::new(NoopAuditSink)).unwrap();
    assert!(!workflow.is_enabled(&transition("pair_up")));
    assert!(matches!(
        workflow.fire(&transition("pair_up"), &mut Counter::default()),
        Err(WorkflowError::NotEnabled { .. })
    ));
}

#[test]
fn enabled_transitions_are_listed_in_ascending_order() {
    let net: WorkflowNet<Counter> = WorkflowNet::builder()
        .place("p")
        .place("q")
        .transition(TransitionSpec::new("zeta").input("p").output("q"))
        .transition(TransitionSpec::new("alpha").input("p").output("q"))
        .transition(TransitionSpec::new("omega").input("q").output("p"))
        .build()
        .unwrap();
    let workflow = ProvisioningWorkflow::new(net, [(place("p"), 1)], Arc::new(NoopAuditSink)).unwrap();
    assert_eq!(workflow.enabled_transitions(), vec![&transition("alpha"), &transition("zeta")]);
}

#[test]
fn invalid_declarations_are_rejected() {
    let duplicate_place = WorkflowNet::<Counter>::builder().place("p").place("p").build();
    assert_eq!(duplicate_place.unwrap_err(), WorkflowError::DuplicatePlace(place("p")));

    let dangling = WorkflowNet::<Counter>::builder()
        .place("p")
        .transition(TransitionSpec::new("t").input("p").output("nowhere"))
        .build();
    assert_eq!(dangling.unwrap_err(), WorkflowError::UnknownPlace(place("nowhere")));

    let duplicate_transition = WorkflowNet::<Counter>::builder()
        .place("p")
        .transition(TransitionSpec::new("t").input("p"))
        .transition(TransitionSpec::new("t").output("p"))
        .build();
    assert_eq!(duplicate_transition.unwrap_err(), WorkflowError::DuplicateTransition(transition("t")));

    let marking = ProvisioningWorkflow::new(two_step_net(), [(place("elsewhere"), 1)], Arc::new(NoopAuditSink));
    assert!(matches!(marking, Err(WorkflowError::UnknownPlace(name)) if name == place("elsewhere")));
}

// ============================================================================
// SECTION: Standard Provisioning Net
// ============================================================================

/// Target failing every migration whose id is in the set.
#[derive(Default)]
struct TenantDatabase {
    broken: Mutex<BTreeSet<String>>,
    applied: Mutex<Vec<String>>,
}

impl ApplyTarget for TenantDatabase {
    fn apply(&self, migration: &MigrationDescriptor) -> Result<(), ApplyError> {
        let id = migration.migration_id.as_str().to_string();
        if self.broken.lock().unwrap().contains(&id) {
            return Err(ApplyError::Failed(format!("{id} is broken")));
        }
        self.applied.lock().unwrap().push(id);
        Ok(())
    }
}

struct EmptySchema;

impl SchemaIntrospector for EmptySchema {
    fn current_schema(&self) -> Result<SchemaSnapshot, IntrospectionError> {
        Ok(SchemaSnapshot::empty())
    }
}

type TenantExecutor =
    MigrationExecutor<TenantDatabase, InMemoryMementoProvider, EmptySchema, InMemoryBaselineStore, ManualClock>;

struct Tenant {
    executor: TenantExecutor,
    template: Option<String>,
    reports: BTreeMap<String, ExecutionReport>,
}

impl Tenant {
    fn new() -> Self {
        Self {
            executor: MigrationExecutor::new(
                TenantId::new("acme"),
                ExecutorCapabilities {
                    target: TenantDatabase::default(),
                    memento: InMemoryMementoProvider::new(),
                    introspector: EmptySchema,
                    baselines: InMemoryBaselineStore::new(),
                    clock: ManualClock::logical(),
                },
                Arc::new(NoopAuditSink),
                ExecutorConfig::default(),
            ),
            template: None,
            reports: BTreeMap::new(),
        }
    }

    fn applied(&self) -> Vec<String> {
        self.executor.capabilities().target.applied.lock().unwrap().clone()
    }
}

impl MigrationHost for Tenant {
    fn migrations_for(&self, stage: &str) -> Vec<MigrationDescriptor> {
        match (stage, self.template.as_deref()) {
            (provisioning::BASIC_STAGE, _) => vec![
                MigrationDescriptor::new("core_accounts", MigrationKind::Module),
                MigrationDescriptor::new("core_parties", MigrationKind::Module).depends_on(["core_accounts"]),
            ],
            (provisioning::TEMPLATE_STAGE, Some(template)) => {
                let mut set = self.migrations_for(provisioning::BASIC_STAGE);
                set.push(
                    MigrationDescriptor::new(format!("template_{template}"), MigrationKind::Template)
                        .depends_on(["core_parties"])
                        .with_payload(serde_json::json!({ "template": template })),
                );
                set
            }
            _ => Vec::new(),
        }
    }

    fn runner(&mut self) -> &mut dyn MigrationRunner {
        &mut self.executor
    }

    fn record_report(&mut self, stage: &str, report: ExecutionReport) {
        self.reports.insert(stage.to_string(), report);
    }
}

impl ProvisioningHost for Tenant {
    fn template_selected(&self) -> bool {
        self.template.is_some()
    }
}

#[test]
fn standard_net_provisions_a_tenant_end_to_end() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let mut workflow = provisioning::standard_workflow::<Tenant>(audit.clone()).unwrap();
    let mut tenant = Tenant::new();

    assert_eq!(workflow.enabled_transitions(), vec![&transition(provisioning::APPLY_BASIC_MIGRATIONS)]);
    workflow.fire(&transition(provisioning::APPLY_BASIC_MIGRATIONS), &mut tenant).unwrap();
    assert!(workflow.is_marked(&place(provisioning::BASIC_MIGRATIONS_APPLIED)));

    let guarded = workflow.fire(&transition(provisioning::SELECT_TEMPLATE), &mut tenant).unwrap_err();
    assert_eq!(guarded, WorkflowError::GuardRejected(transition(provisioning::SELECT_TEMPLATE)));

    tenant.template = Some("retail".to_string());
    workflow.fire(&transition(provisioning::SELECT_TEMPLATE), &mut tenant).unwrap();
    workflow.fire(&transition(provisioning::APPLY_TEMPLATE_MIGRATIONS), &mut tenant).unwrap();
    let last = workflow.fire(&transition(provisioning::ACTIVATE_TENANT), &mut tenant).unwrap();

    assert_eq!(last.sequence, 4);
    assert!(workflow.is_marked(&place(provisioning::TENANT_ACTIVATED)));
    assert_eq!(workflow.marking().values().sum::<u32>(), 1);
    assert_eq!(tenant.applied(), vec!["core_accounts", "core_parties", "template_retail"]);
    assert_eq!(
        tenant.reports.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![provisioning::BASIC_STAGE, provisioning::TEMPLATE_STAGE]
    );

    let sequences: Vec<u64> = audit.transitions().iter().map(|event| event.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}

#[test]
fn failed_stage_keeps_the_tenant_in_place_until_refired() {
    let mut workflow = provisioning::standard_workflow::<Tenant>(Arc::new(NoopAuditSink)).unwrap();
    let mut tenant = Tenant::new();
    tenant.executor.capabilities().target.broken.lock().unwrap().insert("core_parties".to_string());

    let err = workflow.fire(&transition(provisioning::APPLY_BASIC_MIGRATIONS), &mut tenant).unwrap_err();

    let WorkflowError::EffectFailed {
        reason, ..
    } = &err
    else {
        panic!("expected EffectFailed, got {err:?}");
    };
    assert!(reason.contains("core_parties"));
    assert!(workflow.is_marked(&place(provisioning::TENANT_CREATED)));
    assert!(!workflow.is_marked(&place(provisioning::BASIC_MIGRATIONS_APPLIED)));
    assert!(tenant.reports.is_empty());
    assert_eq!(tenant.executor.capabilities().memento.ledger().restored.len(), 1);

    tenant.executor.capabilities().target.broken.lock().unwrap().clear();
    let receipt = workflow.fire(&transition(provisioning::APPLY_BASIC_MIGRATIONS), &mut tenant).unwrap();
    assert_eq!(receipt.sequence, 1);
    assert!(workflow.is_marked(&place(provisioning::BASIC_MIGRATIONS_APPLIED)));
}

#[test]
fn standard_net_declares_the_provisioning_places() {
    let net = provisioning::standard_net::<Tenant>().unwrap();
    let places: Vec<&str> = net.places().iter().map(PlaceId::as_str).collect();
    assert_eq!(
        places,
        vec![
            provisioning::BASIC_MIGRATIONS_APPLIED,
            provisioning::TEMPLATE_MIGRATIONS_APPLIED,
            provisioning::TEMPLATE_SELECTED,
            provisioning::TENANT_ACTIVATED,
            provisioning::TENANT_CREATED,
        ]
    );
    let activate = net.transition(&transition(provisioning::ACTIVATE_TENANT)).unwrap();
    assert_eq!(activate.inputs(), [place(provisioning::TEMPLATE_MIGRATIONS_APPLIED)]);
    assert_eq!(activate.outputs(), [place(provisioning::TENANT_ACTIVATED)]);
}
