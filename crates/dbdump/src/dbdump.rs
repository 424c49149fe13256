//! dbdump - portable SQL dumps of a live data source
//!
//! The engine reads a source's catalog through the `dbdump_core` capability
//! traits and produces one SQL script that recreates its tables, keys and
//! indexes, repopulates them, and snapshots each view into a plain table.
//!
//! Pipeline:
//!
//! - [`CatalogReader`] - maps catalog metadata into the [`Table`] model
//! - [`DependencyGraph`] - orders tables so foreign key targets come first
//! - [`render_table_ddl`] / [`render_indexes`] - stateless DDL rendering
//! - [`RowSerializer`] - turns a row cursor into `INSERT` statements
//! - [`SqlDumper`] - sequences all of the above into a [`DumpScript`]
//!
//! # Example
//!
//! ```ignore
//! use dbdump::{DatabaseDumper, DumpOptions, SqlDumper};
//!
//! let dumper = SqlDumper::new(connection, DumpOptions::default());
//! let script = dumper.dump_string().await?;
//! ```

mod catalog;
mod ddl;
mod dependencies;
mod dumper;
mod error;
mod inserts;
mod model;
mod options;
mod sql;

pub use catalog::CatalogReader;
pub use ddl::{render_indexes, render_table_ddl, render_view_ddl};
pub use dependencies::{CycleBreak, DependencyGraph, DependencyOrder};
pub use dumper::{DatabaseDumper, DumpScript, SqlDumper, dump_blocking};
pub use error::{DumpError, DumpOperation, ObjectKind};
pub use inserts::{InsertError, RowSerializer};
pub use model::{Column, ForeignKey, Index, IndexColumn, Table};
pub use options::{DumpOptions, FailurePolicy};
pub use sql::{quote_identifier, quote_literal};
