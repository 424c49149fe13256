//! Structured model of the objects being dumped
//!
//! Built fresh from the catalog on every dump and never mutated afterwards.

use dbdump_core::SortOrder;

/// A table (or a view snapshotted as one)
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Name as reported by the source, case preserved
    pub name: String,
    pub columns: Vec<Column>,
    /// Primary key columns in catalog order; empty when the table has none
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Distinct tables this one references, in first-reference order
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for fk in &self.foreign_keys {
            if !seen.contains(&fk.referenced_table.as_str()) {
                seen.push(&fk.referenced_table);
            }
        }
        seen
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Declared type name exactly as the source reports it. May be empty.
    pub data_type: String,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }

    /// Whether values of this column are written as bare integers
    pub fn is_integer_typed(&self) -> bool {
        is_integer_type(&self.data_type)
    }
}

/// Integer affinity: the declared type name contains `INT`
pub(crate) fn is_integer_type(data_type: &str) -> bool {
    data_type.to_ascii_uppercase().contains("INT")
}

/// One column edge of a foreign key
///
/// A composite key appears as several edges sharing a `constraint`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    /// Source identifier of the constraint this edge belongs to, if reported
    pub constraint: Option<String>,
}

impl ForeignKey {
    pub fn new(
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
            constraint: None,
        }
    }

    pub fn in_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

/// An index definition
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    /// Created by the engine to back a constraint; never written out
    pub implicit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub name: String,
    /// `None` when the source reports no explicit direction
    pub direction: Option<SortOrder>,
}

impl IndexColumn {
    pub fn new(name: impl Into<String>, direction: Option<SortOrder>) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }
}
