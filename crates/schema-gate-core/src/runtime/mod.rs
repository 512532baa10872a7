// crates/schema-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Schema Gate Runtime
// Description: Resolver, differ, integrity tree, executor, and provisioning workflow.
// Purpose: Plan and execute tenant migrations with verifiable integrity.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules are layered leaves first: the resolver, differ, and
//! integrity tree are pure; the executor combines them with the circuit
//! breaker and host capabilities; the provisioning workflow drives the
//! executor through guarded transitions.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod breaker;
pub mod clock;
pub mod differ;
pub mod executor;
pub mod integrity;
pub mod provisioning;
pub mod resolver;
pub mod store;
pub mod workflow;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use breaker::BreakerConfig;
pub use breaker::CircuitBreaker;
pub use breaker::CircuitOpenError;
pub use breaker::CircuitState;
pub use breaker::CircuitStatus;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use differ::ColumnEdit;
pub use differ::EditScript;
pub use differ::ExactNameTables;
pub use differ::NameAndTypeColumns;
pub use differ::RenameAwareColumnMatcher;
pub use differ::SchemaDiffer;
pub use differ::StructuralTables;
pub use differ::TableChange;
pub use differ::TableEdit;
pub use executor::BaselineCheck;
pub use executor::CancelFlag;
pub use executor::ExecutionError;
pub use executor::ExecutionReport;
pub use executor::ExecutorCapabilities;
pub use executor::ExecutorConfig;
pub use executor::MigrationExecutor;
pub use executor::MigrationRunner;
pub use integrity::InclusionProof;
pub use integrity::IntegrityError;
pub use integrity::IntegrityTree;
pub use integrity::verify_proof;
pub use resolver::DependencyGraph;
pub use resolver::ResolveError;
pub use resolver::resolve;
pub use store::FileBaselineStore;
pub use store::InMemoryBaselineStore;
pub use store::InMemoryMementoProvider;
pub use store::SharedBaselineStore;
pub use workflow::ApplyMigrations;
pub use workflow::EffectError;
pub use workflow::FireReceipt;
pub use workflow::MigrationHost;
pub use workflow::ProvisioningWorkflow;
pub use workflow::TransitionEffect;
pub use workflow::TransitionSpec;
pub use workflow::WorkflowError;
pub use workflow::WorkflowNet;
