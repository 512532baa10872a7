// crates/schema-gate-core/src/runtime/differ.rs
// ============================================================================
// Module: Schema Gate Schema Differ
// Description: Table-level Myers diff and column-level LCS diff between snapshots.
// Purpose: Compute minimal edit scripts used to reconcile structural drift.
// Dependencies: crate::{core, interfaces}, serde
// ============================================================================

//! ## Overview
//! The differ compares two [`SchemaSnapshot`]s in two passes. Table sequences
//! are aligned with the Myers O(ND) shortest edit script under a pluggable
//! [`TableMatcher`]. Each matched table pair is then aligned column by column
//! with a longest common subsequence under a pluggable [`ColumnMatcher`].
//! The LCS back-track steps along the old sequence on ties so that existing
//! column order survives whenever possible.
//!
//! Both passes are pure. Malformed snapshots cannot reach the differ because
//! [`SchemaSnapshot`] rejects duplicate names at construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::ColumnDescriptor;
use crate::core::SchemaSnapshot;
use crate::core::SnapshotError;
use crate::core::TableSchema;
use crate::interfaces::ColumnMatcher;
use crate::interfaces::TableMatcher;

// ============================================================================
// SECTION: Compatibility Predicates
// ============================================================================

/// Default table predicate: tables match when their names are equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactNameTables;

impl TableMatcher for ExactNameTables {
    fn tables_match(&self, old: &TableSchema, new: &TableSchema) -> bool {
        old.name == new.name
    }
}

/// Table predicate that also matches renamed tables with identical columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralTables;

impl TableMatcher for StructuralTables {
    fn tables_match(&self, old: &TableSchema, new: &TableSchema) -> bool {
        old.name == new.name || old.columns == new.columns
    }
}

/// Default column predicate: columns match on name and type.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAndTypeColumns;

impl ColumnMatcher for NameAndTypeColumns {
    fn columns_match(&self, _table: &str, old: &ColumnDescriptor, new: &ColumnDescriptor) -> bool {
        old.name == new.name && old.column_type == new.column_type
    }
}

/// Column predicate honoring explicitly declared renames.
///
/// A declared rename matches when the column types agree; undeclared columns
/// fall back to name and type equality.
#[derive(Debug, Clone, Default)]
pub struct RenameAwareColumnMatcher {
    /// Declared renames keyed by `(table, old column)`.
    renames: BTreeMap<(String, String), String>,
}

impl RenameAwareColumnMatcher {
    /// Creates a matcher with no declared renames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that `old` in `table` was renamed to `new`.
    #[must_use]
    pub fn rename(
        mut self,
        table: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        self.renames.insert((table.into(), old.into()), new.into());
        self
    }
}

impl ColumnMatcher for RenameAwareColumnMatcher {
    fn columns_match(&self, table: &str, old: &ColumnDescriptor, new: &ColumnDescriptor) -> bool {
        if old.column_type != new.column_type {
            return false;
        }
        match self.renames.get(&(table.to_string(), old.name.clone())) {
            Some(renamed) => *renamed == new.name,
            None => old.name == new.name,
        }
    }
}

// ============================================================================
// SECTION: Edit Script
// ============================================================================

/// Column-level edit within a matched table, in new-sequence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnEdit {
    /// Column kept from the old table (possibly renamed or altered).
    Keep {
        /// Column name in the old table.
        old_name: String,
        /// Column definition in the new table.
        column: ColumnDescriptor,
        /// True when the new definition differs from the old one.
        altered: bool,
    },
    /// Column introduced by the new table.
    Add {
        /// New column definition.
        column: ColumnDescriptor,
        /// Preceding column in the new table, `None` when first.
        after: Option<String>,
    },
}

/// Column alignment for a table present in both snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChange {
    /// Table name in the old snapshot.
    pub old_name: String,
    /// Table name in the new snapshot.
    pub new_name: String,
    /// Old columns absent from the common subsequence.
    pub dropped: Vec<String>,
    /// Column edits in new-sequence order.
    pub columns: Vec<ColumnEdit>,
}

impl TableChange {
    /// Returns true when the table is unchanged.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.old_name == self.new_name
            && self.dropped.is_empty()
            && self.columns.iter().all(|edit| matches!(edit, ColumnEdit::Keep { altered: false, .. }))
    }

    /// Returns the added columns in new-sequence order.
    #[must_use]
    pub fn added(&self) -> Vec<&ColumnDescriptor> {
        self.columns
            .iter()
            .filter_map(|edit| match edit {
                ColumnEdit::Add {
                    column, ..
                } => Some(column),
                ColumnEdit::Keep {
                    ..
                } => None,
            })
            .collect()
    }
}

/// Table-level edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableEdit {
    /// Table present only in the new snapshot.
    Added {
        /// New table definition.
        table: TableSchema,
        /// Preceding table in the new snapshot, `None` when first.
        after: Option<String>,
    },
    /// Table present only in the old snapshot.
    Removed {
        /// Removed table name.
        name: String,
    },
    /// Table matched across snapshots.
    Matched(TableChange),
}

/// Edit script transforming an old snapshot into a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditScript {
    /// Table edits in script order (deletions interleaved with new-sequence order).
    pub tables: Vec<TableEdit>,
}

impl EditScript {
    /// Returns true when the script changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(|edit| match edit {
            TableEdit::Matched(change) => change.is_unchanged(),
            TableEdit::Added {
                ..
            }
            | TableEdit::Removed {
                ..
            } => false,
        })
    }

    /// Returns the added tables.
    #[must_use]
    pub fn added_tables(&self) -> Vec<&TableSchema> {
        self.tables
            .iter()
            .filter_map(|edit| match edit {
                TableEdit::Added {
                    table, ..
                } => Some(table),
                _ => None,
            })
            .collect()
    }

    /// Returns the removed table names.
    #[must_use]
    pub fn removed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter_map(|edit| match edit {
                TableEdit::Removed {
                    name,
                } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns matched tables whose structure changed.
    #[must_use]
    pub fn changed_tables(&self) -> Vec<&TableChange> {
        self.tables
            .iter()
            .filter_map(|edit| match edit {
                TableEdit::Matched(change) if !change.is_unchanged() => Some(change),
                _ => None,
            })
            .collect()
    }

    /// Applies the script to `old`, producing the target snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ScriptMismatch`] when the script references
    /// tables or columns absent from `old` or leaves an old table unaccounted
    /// for, and other [`SnapshotError`] variants when the result is malformed.
    pub fn apply(&self, old: &SchemaSnapshot) -> Result<SchemaSnapshot, SnapshotError> {
        let mut consumed = BTreeSet::new();
        let mut tables = Vec::with_capacity(old.len());
        for edit in &self.tables {
            match edit {
                TableEdit::Added {
                    table, ..
                } => tables.push(table.clone()),
                TableEdit::Removed {
                    name,
                } => {
                    require_table(old, name)?;
                    consumed.insert(name.as_str());
                }
                TableEdit::Matched(change) => {
                    let source = require_table(old, &change.old_name)?;
                    consumed.insert(change.old_name.as_str());
                    tables.push(apply_change(source, change)?);
                }
            }
        }
        if let Some(missing) = old.tables().iter().find(|table| !consumed.contains(table.name.as_str()))
        {
            return Err(SnapshotError::ScriptMismatch(format!(
                "table {} not covered by script",
                missing.name
            )));
        }
        SchemaSnapshot::new(tables)
    }
}

/// Looks up a table the script expects to exist.
fn require_table<'a>(old: &'a SchemaSnapshot, name: &str) -> Result<&'a TableSchema, SnapshotError> {
    old.table(name)
        .ok_or_else(|| SnapshotError::ScriptMismatch(format!("table {name} missing from snapshot")))
}

/// Rebuilds one matched table from its column edits.
fn apply_change(source: &TableSchema, change: &TableChange) -> Result<TableSchema, SnapshotError> {
    let mut consumed = BTreeSet::new();
    for name in &change.dropped {
        require_column(source, name)?;
        consumed.insert(name.as_str());
    }
    let mut columns = Vec::with_capacity(change.columns.len());
    for edit in &change.columns {
        match edit {
            ColumnEdit::Keep {
                old_name,
                column,
                ..
            } => {
                require_column(source, old_name)?;
                consumed.insert(old_name.as_str());
                columns.push(column.clone());
            }
            ColumnEdit::Add {
                column, ..
            } => columns.push(column.clone()),
        }
    }
    if consumed.len() != source.columns.len() {
        return Err(SnapshotError::ScriptMismatch(format!(
            "columns of table {} not covered by script",
            source.name
        )));
    }
    Ok(TableSchema::new(change.new_name.clone(), columns))
}

/// Verifies a column the script expects to exist.
fn require_column(table: &TableSchema, name: &str) -> Result<(), SnapshotError> {
    table.column(name).map(|_| ()).ok_or_else(|| {
        SnapshotError::ScriptMismatch(format!("column {name} missing from table {}", table.name))
    })
}

// ============================================================================
// SECTION: Schema Differ
// ============================================================================

/// Snapshot differ parameterized by table and column predicates.
#[derive(Debug, Clone, Default)]
pub struct SchemaDiffer<T = ExactNameTables, C = NameAndTypeColumns> {
    /// Table equivalence predicate.
    tables: T,
    /// Column equivalence predicate.
    columns: C,
}

impl<T: TableMatcher, C: ColumnMatcher> SchemaDiffer<T, C> {
    /// Creates a differ with explicit predicates.
    #[must_use]
    pub const fn new(tables: T, columns: C) -> Self {
        Self {
            tables,
            columns,
        }
    }

    /// Computes the edit script from `old` to `new`.
    #[must_use]
    pub fn diff(&self, old: &SchemaSnapshot, new: &SchemaSnapshot) -> EditScript {
        let old_tables = old.tables();
        let new_tables = new.tables();
        let ops = myers_diff(old_tables, new_tables, |a, b| self.tables.tables_match(a, b));

        let mut edits = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                DiffOp::Equal {
                    old_index,
                    new_index,
                } => {
                    edits.push(TableEdit::Matched(
                        self.diff_columns(&old_tables[old_index], &new_tables[new_index]),
                    ));
                }
                DiffOp::Delete {
                    old_index,
                } => edits.push(TableEdit::Removed {
                    name: old_tables[old_index].name.clone(),
                }),
                DiffOp::Insert {
                    new_index,
                } => edits.push(TableEdit::Added {
                    table: new_tables[new_index].clone(),
                    after: new_index.checked_sub(1).map(|prev| new_tables[prev].name.clone()),
                }),
            }
        }
        EditScript {
            tables: edits,
        }
    }

    /// Aligns the columns of a matched table pair.
    #[must_use]
    pub fn diff_columns(&self, old: &TableSchema, new: &TableSchema) -> TableChange {
        let pairs = lcs_pairs(&old.columns, &new.columns, |a, b| {
            self.columns.columns_match(&old.name, a, b)
        });
        let kept_old: BTreeSet<usize> = pairs.iter().map(|(old_index, _)| *old_index).collect();
        let kept_new: BTreeMap<usize, usize> =
            pairs.iter().map(|(old_index, new_index)| (*new_index, *old_index)).collect();

        let dropped = old
            .columns
            .iter()
            .enumerate()
            .filter(|(index, _)| !kept_old.contains(index))
            .map(|(_, column)| column.name.clone())
            .collect();

        let columns = new
            .columns
            .iter()
            .enumerate()
            .map(|(new_index, column)| match kept_new.get(&new_index) {
                Some(old_index) => {
                    let previous = &old.columns[*old_index];
                    ColumnEdit::Keep {
                        old_name: previous.name.clone(),
                        column: column.clone(),
                        altered: previous != column,
                    }
                }
                None => ColumnEdit::Add {
                    column: column.clone(),
                    after: new_index.checked_sub(1).map(|prev| new.columns[prev].name.clone()),
                },
            })
            .collect();

        TableChange {
            old_name: old.name.clone(),
            new_name: new.name.clone(),
            dropped,
            columns,
        }
    }
}

// ============================================================================
// SECTION: Myers Shortest Edit Script
// ============================================================================

/// Single step of a sequence alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    /// Elements at both indices match.
    Equal {
        /// Index into the old sequence.
        old_index: usize,
        /// Index into the new sequence.
        new_index: usize,
    },
    /// Old element removed.
    Delete {
        /// Index into the old sequence.
        old_index: usize,
    },
    /// New element inserted.
    Insert {
        /// Index into the new sequence.
        new_index: usize,
    },
}

/// Computes the Myers O(ND) shortest edit script between two sequences.
///
/// Only in-bounds points are expanded: a diagonal whose predecessors would
/// step past either sequence end stays unreached for that round. On equal
/// reach the insertion is taken as the later move, so deletions come first.
pub fn myers_diff<T, U, F>(old: &[T], new: &[U], eq: F) -> Vec<DiffOp>
where
    F: Fn(&T, &U) -> bool,
{
    let n = old.len();
    let m = new.len();
    let grid = Grid {
        n,
        m,
    };
    let mut frontier: Vec<Option<usize>> = vec![None; n + m + 1];
    let mut trace: Vec<Vec<Option<usize>>> = Vec::new();
    let mut distance = 0;

    'rounds: for d in 0 ..= n + m {
        trace.push(frontier.clone());
        let previous = &trace[d];
        for idx in grid.diagonals(d) {
            let Some((start, _)) = grid.step(previous, idx, d) else {
                frontier[idx] = None;
                continue;
            };
            let mut x = start;
            let mut y = grid.y_of(x, idx);
            while x < n && y < m && eq(&old[x], &new[y]) {
                x += 1;
                y += 1;
            }
            frontier[idx] = Some(x);
            if x == n && y == m {
                distance = d;
                break 'rounds;
            }
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let mut idx = n;
    let mut x = n;
    for d in (0 ..= distance).rev() {
        let (start, from) = if d == 0 {
            (0, None)
        } else {
            match grid.step(&trace[d], idx, d) {
                Some((start, from)) => (start, Some(from)),
                None => break,
            }
        };
        while x > start {
            x -= 1;
            ops.push(DiffOp::Equal {
                old_index: x,
                new_index: grid.y_of(x, idx),
            });
        }
        match from {
            Some(Step::Right(prev_idx)) => {
                x -= 1;
                ops.push(DiffOp::Delete {
                    old_index: x,
                });
                idx = prev_idx;
            }
            Some(Step::Down(prev_idx)) => {
                idx = prev_idx;
                ops.push(DiffOp::Insert {
                    new_index: grid.y_of(x, idx),
                });
            }
            None => {}
        }
    }
    ops.reverse();
    ops
}

/// Move taken to enter a diagonal.
#[derive(Debug, Clone, Copy)]
enum Step {
    /// Deletion from the diagonal at the given index.
    Right(usize),
    /// Insertion from the diagonal at the given index.
    Down(usize),
}

/// Edit graph geometry; diagonal `k = x - y` is stored at index `k + m`.
#[derive(Debug, Clone, Copy)]
struct Grid {
    /// Old sequence length.
    n: usize,
    /// New sequence length.
    m: usize,
}

impl Grid {
    /// Returns the diagonal indices explored in round `d`.
    fn diagonals(self, d: usize) -> impl Iterator<Item = usize> {
        let low = self.m.saturating_sub(d);
        let high = (self.m + d).min(self.n + self.m);
        let parity = (self.m + d) % 2;
        (low ..= high).filter(move |idx| idx % 2 == parity)
    }

    /// Returns `y` for point `x` on the diagonal at `idx`.
    const fn y_of(self, x: usize, idx: usize) -> usize {
        x + self.m - idx
    }

    /// Picks the furthest in-bounds entry into diagonal `idx` for round `d`.
    ///
    /// Returns the `x` reached before following matches and the move taken.
    fn step(self, previous: &[Option<usize>], idx: usize, d: usize) -> Option<(usize, Step)> {
        if d == 0 {
            return (idx == self.m).then_some((0, Step::Down(idx)));
        }
        let down = idx
            .checked_add(1)
            .and_then(|from| previous.get(from).copied().flatten().map(|x| (x, from)))
            .filter(|(x, from)| self.y_of(*x, *from) < self.m)
            .map(|(x, from)| (x, Step::Down(from)));
        let right = idx
            .checked_sub(1)
            .and_then(|from| previous.get(from).copied().flatten().map(|x| (x, from)))
            .filter(|(x, _)| *x < self.n)
            .map(|(x, from)| (x + 1, Step::Right(from)));
        match (down, right) {
            (Some(down), Some(right)) => Some(if down.0 >= right.0 { down } else { right }),
            (down, right) => down.or(right),
        }
    }
}

// ============================================================================
// SECTION: Longest Common Subsequence
// ============================================================================

/// Computes LCS index pairs `(old, new)` in ascending order.
///
/// Back-tracking steps along the old sequence first when both neighbours
/// carry the same length, preserving existing order on ties.
pub fn lcs_pairs<T, U, F>(old: &[T], new: &[U], eq: F) -> Vec<(usize, usize)>
where
    F: Fn(&T, &U) -> bool,
{
    let n = old.len();
    let m = new.len();
    let width = m + 1;
    let mut dp = vec![0usize; (n + 1) * width];
    for i in 1 ..= n {
        for j in 1 ..= m {
            dp[i * width + j] = if eq(&old[i - 1], &new[j - 1]) {
                dp[(i - 1) * width + (j - 1)] + 1
            } else {
                dp[(i - 1) * width + j].max(dp[i * width + (j - 1)])
            };
        }
    }

    let mut pairs = Vec::with_capacity(dp[n * width + m]);
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if eq(&old[i - 1], &new[j - 1]) {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if dp[(i - 1) * width + j] >= dp[i * width + (j - 1)] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}
