// crates/schema-gate-core/src/core/schema.rs
// ============================================================================
// Module: Schema Gate Schema Model
// Description: Immutable table and column snapshot value types.
// Purpose: Describe a tenant schema at one point in time for diffing and hashing.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`SchemaSnapshot`] is an ordered set of uniquely named tables, each with
//! an ordered list of uniquely named columns. Column order is significant: it
//! feeds both the column-level diff and the integrity leaf hash. Snapshots are
//! validated on construction and on deserialization, and are replaced
//! wholesale rather than patched in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Column Descriptor
// ============================================================================

/// Single column definition within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name, unique within its table.
    pub name: String,
    /// Engine-agnostic type tag (for example `integer`, `text`).
    pub column_type: String,
    /// Whether the column accepts nulls.
    pub nullable: bool,
    /// Default value expression, if any.
    pub default: Option<String>,
}

impl ColumnDescriptor {
    /// Creates a non-nullable column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: false,
            default: None,
        }
    }

    /// Returns the column with the given nullability.
    #[must_use]
    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Returns the column with the given default expression.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

// ============================================================================
// SECTION: Table Schema
// ============================================================================

/// Table definition: a name plus its ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name, unique within a snapshot.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    /// Creates a table definition.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Validates that column names are unique.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::DuplicateColumn`] on the first repeated name.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SnapshotError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Schema Snapshot
// ============================================================================

/// Serialized form of a snapshot prior to validation.
#[derive(Serialize, Deserialize)]
struct SnapshotRepr {
    /// Tables in snapshot order.
    tables: Vec<TableSchema>,
}

/// Immutable schema snapshot with unique table and column names.
///
/// # Invariants
/// - Table names are unique.
/// - Column names are unique within each table.
/// - Table order is the order supplied at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRepr", into = "SnapshotRepr")]
pub struct SchemaSnapshot {
    /// Tables in snapshot order.
    tables: Vec<TableSchema>,
}

impl SchemaSnapshot {
    /// Creates a validated snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when table or column names repeat.
    pub fn new(tables: Vec<TableSchema>) -> Result<Self, SnapshotError> {
        let mut seen = BTreeSet::new();
        for table in &tables {
            if !seen.insert(table.name.as_str()) {
                return Err(SnapshotError::DuplicateTable(table.name.clone()));
            }
            table.validate()?;
        }
        Ok(Self {
            tables,
        })
    }

    /// Returns an empty snapshot.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            tables: Vec::new(),
        }
    }

    /// Returns the tables in snapshot order.
    #[must_use]
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Returns the table names in snapshot order.
    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|table| table.name.as_str()).collect()
    }

    /// Returns the number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true when the snapshot has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Consumes the snapshot and returns its tables.
    #[must_use]
    pub fn into_tables(self) -> Vec<TableSchema> {
        self.tables
    }
}

impl TryFrom<SnapshotRepr> for SchemaSnapshot {
    type Error = SnapshotError;

    fn try_from(value: SnapshotRepr) -> Result<Self, Self::Error> {
        Self::new(value.tables)
    }
}

impl From<SchemaSnapshot> for SnapshotRepr {
    fn from(value: SchemaSnapshot) -> Self {
        Self {
            tables: value.tables,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Malformed snapshot errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// A table name appears more than once.
    #[error("invalid snapshot: duplicate table {0}")]
    DuplicateTable(String),
    /// A column name appears more than once within a table.
    #[error("invalid snapshot: duplicate column {column} in table {table}")]
    DuplicateColumn {
        /// Table containing the duplicate.
        table: String,
        /// Repeated column name.
        column: String,
    },
    /// An edit script does not fit the snapshot it is applied to.
    #[error("invalid snapshot: edit script mismatch: {0}")]
    ScriptMismatch(String),
}
