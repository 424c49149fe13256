//! Dump orchestration
//!
//! [`DatabaseDumper`] is the capability surface of a dumper: the individual
//! pieces of a dump plus the full script. [`SqlDumper`] implements it over
//! any `Connection` that offers schema introspection.

mod script;
mod sql_dumper;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use dbdump_core::Connection;
use std::sync::Arc;

use crate::error::DumpError;
use crate::options::DumpOptions;

pub use script::DumpScript;
pub use sql_dumper::SqlDumper;

#[async_trait]
pub trait DatabaseDumper: Send + Sync {
    /// Tables that will be dumped, in catalog order
    async fn table_names(&self) -> Result<Vec<String>, DumpError>;

    async fn view_names(&self) -> Result<Vec<String>, DumpError>;

    /// `DROP`/`CREATE TABLE` for one table
    async fn ddl_for_table(&self, table: &str) -> Result<String, DumpError>;

    /// `DROP`/`CREATE TABLE` for the snapshot table of one view
    async fn ddl_for_view(&self, view: &str) -> Result<String, DumpError>;

    async fn inserts_for_table(&self, table: &str) -> Result<Vec<String>, DumpError>;

    async fn inserts_for_view(&self, view: &str) -> Result<Vec<String>, DumpError>;

    /// `CREATE INDEX` for the explicit indexes of one table
    async fn indexes_for_table(&self, table: &str) -> Result<Vec<String>, DumpError>;

    /// The complete script
    async fn dump_string(&self) -> Result<String, DumpError>;
}

/// Run a full dump to completion on a private current-thread runtime.
///
/// For callers without an async runtime. Must not be called from inside a
/// Tokio runtime.
pub fn dump_blocking(
    connection: Arc<dyn Connection>,
    options: DumpOptions,
) -> Result<String, DumpError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(DumpError::Runtime)?;

    let dumper = SqlDumper::new(connection, options);
    runtime.block_on(dumper.dump_string())
}
