//! Connection and row cursor traits

use crate::{ColumnMeta, QueryResult, Result, Row, SchemaIntrospection, StatementResult, Value};
use async_trait::async_trait;

/// A database connection
///
/// Callers use one connection sequentially. Drivers are not required to
/// support concurrent use from multiple callers.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgresql", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data or schema
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Open a cursor over the rows of a read query.
    ///
    /// The default implementation buffers the whole result through `query`.
    /// Drivers that can stream should override this. The caller must call
    /// `RowCursor::close` once it stops reading, on success and on error.
    async fn open_cursor(&self, sql: &str) -> Result<Box<dyn RowCursor>> {
        let result = self.query(sql, &[]).await?;
        Ok(Box::new(BufferedCursor::new(result)))
    }

    /// Close the connection. Queries issued afterwards fail.
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Get schema introspection interface if supported
    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        None
    }
}

/// A scoped stream of result rows
#[async_trait]
pub trait RowCursor: Send {
    /// Column metadata, available before the first row is fetched
    fn columns(&self) -> &[ColumnMeta];

    /// Fetch the next row, or `None` once the stream is exhausted
    async fn next_row(&mut self) -> Result<Option<Row>>;

    /// Release the cursor and any source-side resources it holds
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Cursor over an already materialized `QueryResult`
pub struct BufferedCursor {
    columns: Vec<ColumnMeta>,
    rows: std::vec::IntoIter<Row>,
}

impl BufferedCursor {
    pub fn new(result: QueryResult) -> Self {
        Self {
            columns: result.columns,
            rows: result.rows.into_iter(),
        }
    }
}

#[async_trait]
impl RowCursor for BufferedCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::trace!(remaining = self.rows.len(), "buffered cursor released");
        Ok(())
    }
}
