// crates/schema-gate-core/src/runtime/workflow.rs
// ============================================================================
// Module: Schema Gate Provisioning Workflow
// Description: Guarded Petri-net state machine driving tenant provisioning.
// Purpose: Advance provisioning only through explicit, atomic transition firings.
// Dependencies: crate::{audit, core, interfaces, runtime::executor}, thiserror
// ============================================================================

//! ## Overview
//! A [`WorkflowNet`] declares places and transitions. Each transition lists
//! input and output places, an optional [`Guard`] over the external context,
//! and an optional [`TransitionEffect`]. A [`ProvisioningWorkflow`] owns one
//! marking and mutates it only in [`ProvisioningWorkflow::fire`].
//!
//! Firing is atomic: the next marking is computed first, the guard and the
//! effect run next, and the marking is committed only when both pass. The
//! workflow never retries a failed firing on its own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::audit::AuditSink;
use crate::audit::TransitionAuditEvent;
use crate::core::MigrationDescriptor;
use crate::core::PlaceId;
use crate::core::TransitionId;
use crate::interfaces::Guard;
use crate::runtime::executor::ExecutionReport;
use crate::runtime::executor::MigrationRunner;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error returned by a transition effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EffectError(pub String);

impl EffectError {
    /// Creates an effect error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Workflow construction and firing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// A place was declared twice.
    #[error("duplicate place {0}")]
    DuplicatePlace(PlaceId),
    /// A transition was declared twice.
    #[error("duplicate transition {0}")]
    DuplicateTransition(TransitionId),
    /// A transition or marking references an undeclared place.
    #[error("unknown place {0}")]
    UnknownPlace(PlaceId),
    /// The requested transition does not exist.
    #[error("unknown transition {0}")]
    UnknownTransition(TransitionId),
    /// An input place lacks a token.
    #[error("transition {transition} not enabled; missing tokens in {}", join_places(.missing))]
    NotEnabled {
        /// Transition that was asked to fire.
        transition: TransitionId,
        /// Input places without enough tokens.
        missing: Vec<PlaceId>,
    },
    /// The guard returned false.
    #[error("guard rejected transition {0}")]
    GuardRejected(TransitionId),
    /// The effect failed; the marking is unchanged.
    #[error("effect of transition {transition} failed: {reason}")]
    EffectFailed {
        /// Transition whose effect failed.
        transition: TransitionId,
        /// Effect failure detail.
        reason: String,
    },
    /// An output place would exceed the token limit.
    #[error("token count overflow in place {0}")]
    TokenOverflow(PlaceId),
}

/// Renders place identifiers as a comma separated list.
fn join_places(places: &[PlaceId]) -> String {
    places.iter().map(PlaceId::as_str).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Effects
// ============================================================================

/// Side effect executed when a transition fires.
pub trait TransitionEffect<C> {
    /// Runs the effect against the external context.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError`] to abort the firing.
    fn run(&self, ctx: &mut C) -> Result<(), EffectError>;
}

impl<C, F> TransitionEffect<C> for F
where
    F: Fn(&mut C) -> Result<(), EffectError>,
{
    fn run(&self, ctx: &mut C) -> Result<(), EffectError> {
        self(ctx)
    }
}

/// Context that can reach a migration runner.
pub trait MigrationHost {
    /// Returns the migrations registered for `stage`.
    fn migrations_for(&self, stage: &str) -> Vec<MigrationDescriptor>;

    /// Returns the runner used for this tenant.
    fn runner(&mut self) -> &mut dyn MigrationRunner;

    /// Receives the report of a successful stage.
    fn record_report(&mut self, _stage: &str, _report: ExecutionReport) {}
}

/// Effect that runs one stage's migrations and fails unless all succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyMigrations {
    /// Stage label passed to [`MigrationHost::migrations_for`].
    stage: String,
}

impl ApplyMigrations {
    /// Creates the effect for a stage.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
        }
    }
}

impl<C: MigrationHost> TransitionEffect<C> for ApplyMigrations {
    fn run(&self, ctx: &mut C) -> Result<(), EffectError> {
        let migrations = ctx.migrations_for(&self.stage);
        let report = ctx
            .runner()
            .run_migrations(&migrations)
            .map_err(|err| EffectError::new(err.to_string()))?;
        if !report.succeeded() {
            return Err(EffectError::new(format!(
                "{} migrations were cancelled before completing",
                self.stage
            )));
        }
        ctx.record_report(&self.stage, report);
        Ok(())
    }
}

// ============================================================================
// SECTION: Net Definition
// ============================================================================

/// Transition declaration.
pub struct TransitionSpec<C> {
    /// Transition identifier.
    id: TransitionId,
    /// Places consuming one token each.
    inputs: Vec<PlaceId>,
    /// Places receiving one token each.
    outputs: Vec<PlaceId>,
    /// Optional guard.
    guard: Option<Box<dyn Guard<C>>>,
    /// Optional effect.
    effect: Option<Box<dyn TransitionEffect<C>>>,
}

impl<C> TransitionSpec<C> {
    /// Starts a transition declaration.
    #[must_use]
    pub fn new(id: impl Into<TransitionId>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            guard: None,
            effect: None,
        }
    }

    /// Adds an input arc.
    #[must_use]
    pub fn input(mut self, place: impl Into<PlaceId>) -> Self {
        self.inputs.push(place.into());
        self
    }

    /// Adds an output arc.
    #[must_use]
    pub fn output(mut self, place: impl Into<PlaceId>) -> Self {
        self.outputs.push(place.into());
        self
    }

    /// Sets the guard.
    #[must_use]
    pub fn guard(mut self, guard: impl Guard<C> + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    /// Sets the effect.
    #[must_use]
    pub fn effect(mut self, effect: impl TransitionEffect<C> + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }

    /// Returns the transition identifier.
    #[must_use]
    pub const fn id(&self) -> &TransitionId {
        &self.id
    }

    /// Returns the input places.
    #[must_use]
    pub fn inputs(&self) -> &[PlaceId] {
        &self.inputs
    }

    /// Returns the output places.
    #[must_use]
    pub fn outputs(&self) -> &[PlaceId] {
        &self.outputs
    }

    /// Returns tokens required per input place.
    fn demand(&self) -> BTreeMap<&PlaceId, u32> {
        let mut demand = BTreeMap::new();
        for place in &self.inputs {
            *demand.entry(place).or_insert(0u32) += 1;
        }
        demand
    }
}

impl<C> fmt::Debug for TransitionSpec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionSpec")
            .field("id", &self.id)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("guarded", &self.guard.is_some())
            .field("has_effect", &self.effect.is_some())
            .finish()
    }
}

/// Validated place/transition net.
#[derive(Debug)]
pub struct WorkflowNet<C> {
    /// Declared places.
    places: BTreeSet<PlaceId>,
    /// Transitions keyed by identifier.
    transitions: BTreeMap<TransitionId, TransitionSpec<C>>,
}

impl<C> WorkflowNet<C> {
    /// Starts building a net.
    #[must_use]
    pub fn builder() -> WorkflowNetBuilder<C> {
        WorkflowNetBuilder {
            places: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Returns the declared places.
    #[must_use]
    pub const fn places(&self) -> &BTreeSet<PlaceId> {
        &self.places
    }

    /// Returns a transition by identifier.
    #[must_use]
    pub fn transition(&self, id: &TransitionId) -> Option<&TransitionSpec<C>> {
        self.transitions.get(id)
    }
}

/// Builder for [`WorkflowNet`].
pub struct WorkflowNetBuilder<C> {
    /// Places in declaration order.
    places: Vec<PlaceId>,
    /// Transitions in declaration order.
    transitions: Vec<TransitionSpec<C>>,
}

impl<C> WorkflowNetBuilder<C> {
    /// Declares a place.
    #[must_use]
    pub fn place(mut self, place: impl Into<PlaceId>) -> Self {
        self.places.push(place.into());
        self
    }

    /// Declares a transition.
    #[must_use]
    pub fn transition(mut self, spec: TransitionSpec<C>) -> Self {
        self.transitions.push(spec);
        self
    }

    /// Validates and builds the net.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] for duplicate declarations or arcs to
    /// undeclared places.
    pub fn build(self) -> Result<WorkflowNet<C>, WorkflowError> {
        let mut places = BTreeSet::new();
        for place in self.places {
            if places.contains(&place) {
                return Err(WorkflowError::DuplicatePlace(place));
            }
            places.insert(place);
        }
        let mut transitions = BTreeMap::new();
        for spec in self.transitions {
            if let Some(unknown) =
                spec.inputs.iter().chain(&spec.outputs).find(|place| !places.contains(*place))
            {
                return Err(WorkflowError::UnknownPlace(unknown.clone()));
            }
            if transitions.contains_key(&spec.id) {
                return Err(WorkflowError::DuplicateTransition(spec.id));
            }
            transitions.insert(spec.id.clone(), spec);
        }
        Ok(WorkflowNet {
            places,
            transitions,
        })
    }
}

// ============================================================================
// SECTION: Workflow Run
// ============================================================================

/// Record of one successful firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireReceipt {
    /// Fired transition.
    pub transition_id: TransitionId,
    /// Firing sequence number, starting at 1.
    pub sequence: u64,
    /// Marking after the firing.
    pub marking: BTreeMap<PlaceId, u32>,
}

/// One workflow run over a net.
pub struct ProvisioningWorkflow<C> {
    /// Net definition.
    net: WorkflowNet<C>,
    /// Tokens per place; every declared place has an entry.
    marking: BTreeMap<PlaceId, u32>,
    /// Audit sink for transition events.
    audit: Arc<dyn AuditSink>,
    /// Successful firings so far.
    fired: u64,
}

impl<C> ProvisioningWorkflow<C> {
    /// Creates a run with an initial marking.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::UnknownPlace`] when the marking names an
    /// undeclared place.
    pub fn new(
        net: WorkflowNet<C>,
        initial: impl IntoIterator<Item = (PlaceId, u32)>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, WorkflowError> {
        let mut marking: BTreeMap<PlaceId, u32> =
            net.places.iter().map(|place| (place.clone(), 0)).collect();
        for (place, tokens) in initial {
            let slot =
                marking.get_mut(&place).ok_or_else(|| WorkflowError::UnknownPlace(place.clone()))?;
            *slot = slot.checked_add(tokens).ok_or(WorkflowError::TokenOverflow(place))?;
        }
        Ok(Self {
            net,
            marking,
            audit,
            fired: 0,
        })
    }

    /// Returns the current marking.
    #[must_use]
    pub const fn marking(&self) -> &BTreeMap<PlaceId, u32> {
        &self.marking
    }

    /// Returns the tokens in a place, zero for undeclared places.
    #[must_use]
    pub fn tokens(&self, place: &PlaceId) -> u32 {
        self.marking.get(place).copied().unwrap_or(0)
    }

    /// Returns true when every input place holds enough tokens.
    ///
    /// Guards are not evaluated because they need the external context.
    #[must_use]
    pub fn is_enabled(&self, transition: &TransitionId) -> bool {
        self.net.transitions.get(transition).is_some_and(|spec| self.missing(spec).is_empty())
    }

    /// Returns token-enabled transitions in ascending identifier order.
    #[must_use]
    pub fn enabled_transitions(&self) -> Vec<&TransitionId> {
        self.net
            .transitions
            .values()
            .filter(|spec| self.missing(spec).is_empty())
            .map(TransitionSpec::id)
            .collect()
    }

    /// Returns true when the marking holds at least one token in `place`.
    #[must_use]
    pub fn is_marked(&self, place: &PlaceId) -> bool {
        self.tokens(place) > 0
    }

    /// Fires one transition against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] when the transition is unknown, not enabled,
    /// rejected by its guard, or its effect fails. The marking is unchanged
    /// in every error case.
    pub fn fire(
        &mut self,
        transition: &TransitionId,
        ctx: &mut C,
    ) -> Result<FireReceipt, WorkflowError> {
        let spec = self
            .net
            .transitions
            .get(transition)
            .ok_or_else(|| WorkflowError::UnknownTransition(transition.clone()))?;

        let missing = self.missing(spec);
        if !missing.is_empty() {
            return Err(WorkflowError::NotEnabled {
                transition: transition.clone(),
                missing,
            });
        }

        let mut next = self.marking.clone();
        for place in &spec.inputs {
            if let Some(tokens) = next.get_mut(place) {
                *tokens -= 1;
            }
        }
        for place in &spec.outputs {
            let tokens = next.entry(place.clone()).or_insert(0);
            *tokens = tokens.checked_add(1).ok_or_else(|| WorkflowError::TokenOverflow(place.clone()))?;
        }

        if let Some(guard) = &spec.guard
            && !guard.allows(ctx)
        {
            return Err(WorkflowError::GuardRejected(transition.clone()));
        }
        if let Some(effect) = &spec.effect {
            effect.run(ctx).map_err(|err| WorkflowError::EffectFailed {
                transition: transition.clone(),
                reason: err.to_string(),
            })?;
        }

        let before = std::mem::replace(&mut self.marking, next);
        self.fired += 1;
        self.audit.record_transition(&TransitionAuditEvent::new(
            transition.clone(),
            self.fired,
            before,
            self.marking.clone(),
        ));
        Ok(FireReceipt {
            transition_id: transition.clone(),
            sequence: self.fired,
            marking: self.marking.clone(),
        })
    }

    /// Returns input places lacking tokens for `spec`.
    fn missing(&self, spec: &TransitionSpec<C>) -> Vec<PlaceId> {
        spec.demand()
            .into_iter()
            .filter(|(place, needed)| self.tokens(place) < *needed)
            .map(|(place, _)| place.clone())
            .collect()
    }
}
