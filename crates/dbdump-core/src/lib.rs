//! dbdump core - shared abstractions for the dump engine and its drivers
//!
//! This crate provides the capability surface the dump engine consumes from a
//! data source. It defines:
//!
//! - `Connection` - Trait for executing queries and opening row cursors
//! - `RowCursor` - Trait for a scoped, explicitly released row stream
//! - `SchemaIntrospection` - Trait for catalog metadata queries
//! - Common types like `Value`, `Row`, `ColumnMeta`, `TableInfo`, etc.

mod connection;
mod error;
mod schema;
mod types;

pub use connection::*;
pub use error::*;
pub use schema::*;
pub use types::*;
