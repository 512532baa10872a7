// crates/schema-gate-core/src/runtime/provisioning.rs
// ============================================================================
// Module: Schema Gate Standard Provisioning Net
// Description: Canonical tenant provisioning net built on the workflow engine.
// Purpose: Wire basic and template migration stages into a guarded net.
// Dependencies: crate::{audit, core, runtime::workflow}
// ============================================================================

//! ## Overview
//! The standard net is a straight line:
//! `tenant_created → basic_migrations_applied → template_selected →
//! template_migrations_applied → tenant_activated`. Both migration stages run
//! through [`ApplyMigrations`], so a failed stage leaves the marking where it
//! was and the stage can be fired again once the cause is fixed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::core::PlaceId;
use crate::runtime::workflow::ApplyMigrations;
use crate::runtime::workflow::MigrationHost;
use crate::runtime::workflow::ProvisioningWorkflow;
use crate::runtime::workflow::TransitionSpec;
use crate::runtime::workflow::WorkflowError;
use crate::runtime::workflow::WorkflowNet;

// ============================================================================
// SECTION: Places and Transitions
// ============================================================================

/// Place holding a freshly created tenant.
pub const TENANT_CREATED: &str = "tenant_created";
/// Place reached once the basic migrations are applied.
pub const BASIC_MIGRATIONS_APPLIED: &str = "basic_migrations_applied";
/// Place reached once a template is chosen.
pub const TEMPLATE_SELECTED: &str = "template_selected";
/// Place reached once the template migrations are applied.
pub const TEMPLATE_MIGRATIONS_APPLIED: &str = "template_migrations_applied";
/// Terminal place of an active tenant.
pub const TENANT_ACTIVATED: &str = "tenant_activated";

/// Transition applying the basic migrations.
pub const APPLY_BASIC_MIGRATIONS: &str = "apply_basic_migrations";
/// Transition recording the template choice.
pub const SELECT_TEMPLATE: &str = "select_template";
/// Transition applying the template migrations.
pub const APPLY_TEMPLATE_MIGRATIONS: &str = "apply_template_migrations";
/// Transition activating the tenant.
pub const ACTIVATE_TENANT: &str = "activate_tenant";

/// Stage label for basic migrations.
pub const BASIC_STAGE: &str = "basic";
/// Stage label for template migrations.
pub const TEMPLATE_STAGE: &str = "template";

// ============================================================================
// SECTION: Host Context
// ============================================================================

/// Context driven by the standard provisioning net.
pub trait ProvisioningHost: MigrationHost {
    /// Returns true once a template has been chosen for the tenant.
    fn template_selected(&self) -> bool;

    /// Returns true when the tenant may be activated.
    fn activation_allowed(&self) -> bool {
        true
    }
}

// ============================================================================
// SECTION: Standard Net
// ============================================================================

/// Builds the standard provisioning net.
///
/// # Errors
///
/// Returns [`WorkflowError`] only if the fixed declarations are inconsistent.
pub fn standard_net<C: ProvisioningHost + 'static>() -> Result<WorkflowNet<C>, WorkflowError> {
    WorkflowNet::builder()
        .place(TENANT_CREATED)
        .place(BASIC_MIGRATIONS_APPLIED)
        .place(TEMPLATE_SELECTED)
        .place(TEMPLATE_MIGRATIONS_APPLIED)
        .place(TENANT_ACTIVATED)
        .transition(
            TransitionSpec::new(APPLY_BASIC_MIGRATIONS)
                .input(TENANT_CREATED)
                .output(BASIC_MIGRATIONS_APPLIED)
                .effect(ApplyMigrations::new(BASIC_STAGE)),
        )
        .transition(
            TransitionSpec::new(SELECT_TEMPLATE)
                .input(BASIC_MIGRATIONS_APPLIED)
                .output(TEMPLATE_SELECTED)
                .guard(|ctx: &C| ctx.template_selected()),
        )
        .transition(
            TransitionSpec::new(APPLY_TEMPLATE_MIGRATIONS)
                .input(TEMPLATE_SELECTED)
                .output(TEMPLATE_MIGRATIONS_APPLIED)
                .effect(ApplyMigrations::new(TEMPLATE_STAGE)),
        )
        .transition(
            TransitionSpec::new(ACTIVATE_TENANT)
                .input(TEMPLATE_MIGRATIONS_APPLIED)
                .output(TENANT_ACTIVATED)
                .guard(|ctx: &C| ctx.activation_allowed()),
        )
        .build()
}

/// Builds a workflow run over the standard net with one token in `tenant_created`.
///
/// # Errors
///
/// Returns [`WorkflowError`] only if the fixed declarations are inconsistent.
pub fn standard_workflow<C: ProvisioningHost + 'static>(
    audit: Arc<dyn AuditSink>,
) -> Result<ProvisioningWorkflow<C>, WorkflowError> {
    ProvisioningWorkflow::new(standard_net()?, [(PlaceId::new(TENANT_CREATED), 1)], audit)
}
