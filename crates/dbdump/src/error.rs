//! Dump engine errors

use dbdump_core::DbDumpError;
use std::fmt;
use thiserror::Error;

use crate::inserts::InsertError;

/// Kind of object a dump step was working on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Table => write!(f, "table"),
            ObjectKind::View => write!(f, "view"),
        }
    }
}

/// Dump step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpOperation {
    Catalog,
    Ddl,
    Inserts,
    Indexes,
}

impl fmt::Display for DumpOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpOperation::Catalog => write!(f, "catalog"),
            DumpOperation::Ddl => write!(f, "DDL"),
            DumpOperation::Inserts => write!(f, "inserts"),
            DumpOperation::Indexes => write!(f, "indexes"),
        }
    }
}

/// Errors during a dump
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("Schema introspection not supported by driver '{0}'")]
    SchemaIntrospectionNotSupported(String),

    /// Metadata query failure not tied to a single object (table listing,
    /// view listing, source identification)
    #[error("Catalog error: {0}")]
    Catalog(#[from] DbDumpError),

    #[error("{kind} \"{name}\": {operation} failed: {source}")]
    Object {
        kind: ObjectKind,
        name: String,
        operation: DumpOperation,
        #[source]
        source: DbDumpError,
    },

    #[error("{kind} \"{name}\": cursor release failed: {source}")]
    CursorRelease {
        kind: ObjectKind,
        name: String,
        #[source]
        source: DbDumpError,
    },

    #[error("Invalid dump options: {0}")]
    Config(String),

    #[error("Failed to start dump runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl DumpError {
    pub(crate) fn object(
        kind: ObjectKind,
        name: &str,
        operation: DumpOperation,
        source: DbDumpError,
    ) -> Self {
        DumpError::Object {
            kind,
            name: name.to_string(),
            operation,
            source,
        }
    }

    pub(crate) fn from_inserts(kind: ObjectKind, name: &str, error: InsertError) -> Self {
        match error {
            InsertError::Fetch(source) => {
                Self::object(kind, name, DumpOperation::Inserts, source)
            }
            InsertError::Release(source) => DumpError::CursorRelease {
                kind,
                name: name.to_string(),
                source,
            },
        }
    }

    /// Name of the table or view the error is about, if any
    pub fn object_name(&self) -> Option<&str> {
        match self {
            DumpError::Object { name, .. } | DumpError::CursorRelease { name, .. } => Some(name),
            _ => None,
        }
    }
}
