// crates/schema-gate-core/src/runtime/integrity.rs
// ============================================================================
// Module: Schema Gate Integrity Tree
// Description: Binary hash tree over per-table leaf digests with inclusion proofs.
// Purpose: Make schema integrity claims verifiable from a root and a short proof.
// Dependencies: crate::core::{hashing, schema}, serde, thiserror
// ============================================================================

//! ## Overview
//! Leaves are table digests in lexicographic table-name order. A leaf digest
//! covers the canonical JSON of the table name and its ordered columns behind
//! a leaf domain prefix; interior nodes hash the raw bytes of both children
//! behind a node prefix, so a leaf can never be replayed as a node.
//!
//! When a level has an odd number of nodes the last node is paired with
//! itself. Proofs record that node's own digest as the sibling, so
//! verification needs no special case.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ColumnDescriptor;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::HashAlgorithm;
use crate::core::HashDigest;
use crate::core::HashError;
use crate::core::SchemaSnapshot;
use crate::core::TableSchema;
use crate::core::hashing::EMPTY_PREFIX;
use crate::core::hashing::LEAF_PREFIX;
use crate::core::hashing::hash_node;
use crate::core::hashing::hash_parts;
use crate::core::hashing::hash_prefixed_json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Versioned format tag embedded in every leaf.
pub const LEAF_FORMAT: &str = "schema-gate.table.v1";

/// Marker hashed behind [`EMPTY_PREFIX`] for a tree without tables.
pub const EMPTY_MARKER: &str = "schema-gate.empty.v1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Integrity tree errors.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The requested table is not covered by the tree.
    #[error("table not found in integrity tree: {0}")]
    TableNotFound(String),
    /// Hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Proofs
// ============================================================================

/// Side on which a sibling sits relative to the running digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingPosition {
    /// Sibling is the left child; the running digest is the right child.
    Left,
    /// Sibling is the right child; the running digest is the left child.
    Right,
}

/// One level of an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Sibling digest at this level.
    pub sibling: HashDigest,
    /// Sibling position.
    pub position: SiblingPosition,
}

/// Leaf-to-root path for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Hash algorithm used by the tree.
    pub algorithm: HashAlgorithm,
    /// Table the proof covers.
    pub table_name: String,
    /// Steps ordered from the leaf level upward.
    pub steps: Vec<ProofStep>,
}

// ============================================================================
// SECTION: Leaf Hashing
// ============================================================================

/// Canonical leaf body.
#[derive(Serialize)]
struct LeafRecord<'a> {
    /// Format tag.
    format: &'static str,
    /// Table name.
    name: &'a str,
    /// Ordered columns.
    columns: &'a [ColumnDescriptor],
}

/// Computes the leaf digest of one table.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn leaf_hash(algorithm: HashAlgorithm, table: &TableSchema) -> Result<HashDigest, HashError> {
    hash_prefixed_json(
        algorithm,
        LEAF_PREFIX,
        &LeafRecord {
            format: LEAF_FORMAT,
            name: &table.name,
            columns: &table.columns,
        },
    )
}

/// Returns the root digest of a tree without tables.
#[must_use]
pub fn empty_root(algorithm: HashAlgorithm) -> HashDigest {
    hash_parts(algorithm, &[&[EMPTY_PREFIX], EMPTY_MARKER.as_bytes()])
}

// ============================================================================
// SECTION: Integrity Tree
// ============================================================================

/// Hash tree over a schema snapshot.
#[derive(Debug, Clone)]
pub struct IntegrityTree {
    /// Hash algorithm.
    algorithm: HashAlgorithm,
    /// Table names in leaf order.
    leaf_names: Vec<String>,
    /// Levels from leaves (index 0) to the root level.
    levels: Vec<Vec<HashDigest>>,
    /// Root digest.
    root: HashDigest,
    /// Lazily built table name to leaf index map.
    positions: OnceLock<BTreeMap<String, usize>>,
}

impl IntegrityTree {
    /// Builds a tree with the default algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when a leaf or node cannot be hashed.
    pub fn build(snapshot: &SchemaSnapshot) -> Result<Self, HashError> {
        Self::build_with(DEFAULT_HASH_ALGORITHM, snapshot)
    }

    /// Builds a tree with an explicit algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when a leaf or node cannot be hashed.
    pub fn build_with(algorithm: HashAlgorithm, snapshot: &SchemaSnapshot) -> Result<Self, HashError> {
        let mut tables: Vec<&TableSchema> = snapshot.tables().iter().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        let leaf_names = tables.iter().map(|table| table.name.clone()).collect();
        let leaves = tables
            .iter()
            .map(|table| leaf_hash(algorithm, table))
            .collect::<Result<Vec<_>, _>>()?;

        if leaves.is_empty() {
            return Ok(Self {
                algorithm,
                leaf_names,
                levels: Vec::new(),
                root: empty_root(algorithm),
                positions: OnceLock::new(),
            });
        }

        let mut levels = vec![leaves];
        while let Some(current) = levels.last()
            && current.len() > 1
        {
            let next = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    hash_node(algorithm, left, right)
                })
                .collect::<Result<Vec<_>, _>>()?;
            levels.push(next);
        }
        let root = levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_else(|| empty_root(algorithm));

        Ok(Self {
            algorithm,
            leaf_names,
            levels,
            root,
            positions: OnceLock::new(),
        })
    }

    /// Returns the root digest.
    #[must_use]
    pub const fn root(&self) -> &HashDigest {
        &self.root
    }

    /// Returns the hash algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Returns the number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaf_names.len()
    }

    /// Returns the number of node levels above the leaves.
    ///
    /// Equals `ceil(log2(leaf_count))` and the length of every proof; zero
    /// for empty and single-table trees.
    #[must_use]
    pub fn height(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Returns table names in leaf order.
    #[must_use]
    pub fn table_names(&self) -> &[String] {
        &self.leaf_names
    }

    /// Generates the inclusion proof for a table.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::TableNotFound`] when the table is not covered.
    pub fn generate_proof(&self, table_name: &str) -> Result<InclusionProof, IntegrityError> {
        let mut index = *self
            .positions()
            .get(table_name)
            .ok_or_else(|| IntegrityError::TableNotFound(table_name.to_string()))?;

        let mut steps = Vec::with_capacity(self.levels.len().saturating_sub(1));
        for level in self.levels.iter().take(self.levels.len().saturating_sub(1)) {
            let (sibling_index, position) = if index % 2 == 0 {
                (index + 1, SiblingPosition::Right)
            } else {
                (index - 1, SiblingPosition::Left)
            };
            let sibling = level.get(sibling_index).or_else(|| level.get(index));
            if let Some(sibling) = sibling {
                steps.push(ProofStep {
                    sibling: sibling.clone(),
                    position,
                });
            }
            index /= 2;
        }

        Ok(InclusionProof {
            algorithm: self.algorithm,
            table_name: table_name.to_string(),
            steps,
        })
    }

    /// Returns the name to leaf index map, building it on first use.
    fn positions(&self) -> &BTreeMap<String, usize> {
        self.positions.get_or_init(|| {
            self.leaf_names.iter().enumerate().map(|(index, name)| (name.clone(), index)).collect()
        })
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies that `table` is included under `root`.
///
/// Returns false on any mismatch, including a name that disagrees with the
/// table or the proof, or a malformed digest.
#[must_use]
pub fn verify_proof(
    table_name: &str,
    table: &TableSchema,
    proof: &InclusionProof,
    root: &HashDigest,
) -> bool {
    if table.name != table_name || proof.table_name != table_name || root.algorithm != proof.algorithm
    {
        return false;
    }
    let Ok(mut running) = leaf_hash(proof.algorithm, table) else {
        return false;
    };
    for step in &proof.steps {
        let next = match step.position {
            SiblingPosition::Left => hash_node(proof.algorithm, &step.sibling, &running),
            SiblingPosition::Right => hash_node(proof.algorithm, &running, &step.sibling),
        };
        match next {
            Ok(digest) => running = digest,
            Err(_) => return false,
        }
    }
    running == *root
}

// ============================================================================
// SECTION: Tests
// ============================================================================
