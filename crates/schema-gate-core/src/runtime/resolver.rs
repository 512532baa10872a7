// crates/schema-gate-core/src/runtime/resolver.rs
// ============================================================================
// Module: Schema Gate Dependency Resolver
// Description: Deterministic topological ordering of migration descriptors.
// Purpose: Reject cyclic or dangling migration sets before any target is touched.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The resolver orders migrations with Kahn's algorithm. The work queue is
//! FIFO and seeded in ascending identifier order, and dependents are released
//! in ascending identifier order, so equal-priority migrations always come
//! out in the same order. Resolution is a pure function of its input set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use thiserror::Error;

use crate::core::MigrationDescriptor;
use crate::core::MigrationId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Resolution failures. All are detected before any migration is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The listed migrations could not be ordered because of a cycle.
    #[error("circular dependency among migrations: {}", join_ids(.unresolved))]
    CircularDependency {
        /// Every migration left unresolved, in ascending order.
        unresolved: Vec<MigrationId>,
    },
    /// A migration references an identifier absent from the input set.
    #[error("migration {migration} depends on unknown migration {dependency}")]
    UnknownDependency {
        /// Migration declaring the dependency.
        migration: MigrationId,
        /// Missing dependency identifier.
        dependency: MigrationId,
    },
    /// The same identifier appears on more than one descriptor.
    #[error("duplicate migration identifier {0}")]
    DuplicateMigration(MigrationId),
}

/// Renders identifiers as a comma separated list.
fn join_ids(ids: &[MigrationId]) -> String {
    ids.iter().map(MigrationId::as_str).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Dependency Graph
// ============================================================================

/// Transient adjacency built once per resolution call.
#[derive(Debug, Clone)]
pub struct DependencyGraph<'a> {
    /// Descriptors keyed by identifier.
    descriptors: BTreeMap<&'a MigrationId, &'a MigrationDescriptor>,
    /// Dependency to dependents, each list in ascending identifier order.
    dependents: BTreeMap<&'a MigrationId, Vec<&'a MigrationId>>,
    /// Number of distinct dependencies per descriptor.
    in_degree: BTreeMap<&'a MigrationId, usize>,
}

impl<'a> DependencyGraph<'a> {
    /// Builds the graph and validates that every dependency is known.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DuplicateMigration`] or
    /// [`ResolveError::UnknownDependency`] for malformed input sets.
    pub fn build(descriptors: &'a [MigrationDescriptor]) -> Result<Self, ResolveError> {
        let mut by_id = BTreeMap::new();
        for descriptor in descriptors {
            if by_id.insert(&descriptor.migration_id, descriptor).is_some() {
                return Err(ResolveError::DuplicateMigration(descriptor.migration_id.clone()));
            }
        }

        let mut dependents: BTreeMap<&MigrationId, Vec<&MigrationId>> = BTreeMap::new();
        let mut in_degree = BTreeMap::new();
        for (&id, &descriptor) in &by_id {
            let unique: BTreeSet<&MigrationId> = descriptor.dependencies.iter().collect();
            for &dependency in &unique {
                if !by_id.contains_key(dependency) {
                    return Err(ResolveError::UnknownDependency {
                        migration: id.clone(),
                        dependency: dependency.clone(),
                    });
                }
                dependents.entry(dependency).or_default().push(id);
            }
            in_degree.insert(id, unique.len());
        }

        Ok(Self {
            descriptors: by_id,
            dependents,
            in_degree,
        })
    }

    /// Returns the number of descriptors in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true when the graph has no descriptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Returns the direct dependents of a migration in ascending order.
    #[must_use]
    pub fn dependents_of(&self, id: &MigrationId) -> &[&'a MigrationId] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Produces a total order where every dependency precedes its dependents.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::CircularDependency`] naming every descriptor
    /// that could not be placed.
    pub fn order(&self) -> Result<Vec<&'a MigrationDescriptor>, ResolveError> {
        let mut remaining = self.in_degree.clone();
        let mut queue: VecDeque<&MigrationId> =
            remaining.iter().filter(|(_, degree)| **degree == 0).map(|(id, _)| *id).collect();
        let mut ordered = Vec::with_capacity(self.descriptors.len());

        while let Some(id) = queue.pop_front() {
            if let Some(descriptor) = self.descriptors.get(id) {
                ordered.push(*descriptor);
            }
            for &dependent in self.dependents_of(id) {
                if let Some(degree) = remaining.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if ordered.len() < self.descriptors.len() {
            let unresolved = remaining
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.clone())
                .collect();
            return Err(ResolveError::CircularDependency {
                unresolved,
            });
        }
        Ok(ordered)
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves a descriptor set into an owned, dependency-respecting order.
///
/// # Errors
///
/// Returns [`ResolveError`] for duplicate identifiers, unknown dependencies,
/// or cycles.
pub fn resolve(
    descriptors: &[MigrationDescriptor],
) -> Result<Vec<MigrationDescriptor>, ResolveError> {
    let graph = DependencyGraph::build(descriptors)?;
    Ok(graph.order()?.into_iter().cloned().collect())
}
