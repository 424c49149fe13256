//! SQLite connection implementation

use async_trait::async_trait;
use dbdump_core::{
    ColumnMeta, Connection, DbDumpError, QueryResult, Result, Row, RowCursor,
    SchemaIntrospection, StatementResult, Value,
};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, Statement, params_from_iter};
use std::sync::Arc;

use crate::cursor::SqliteCursor;

/// Handle shared between the connection and its open cursors
pub(crate) type SharedHandle = Arc<Mutex<Option<RusqliteConnection>>>;

/// SQLite connection wrapper
///
/// The underlying handle is dropped by `close`; every call made afterwards
/// fails with a connection error. An open cursor holds the handle until it is
/// closed, and other calls fail as busy in the meantime.
pub struct SqliteConnection {
    conn: SharedHandle,
}

impl SqliteConnection {
    /// Open a SQLite database. `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                DbDumpError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !path.starts_with("file:") {
                let parent = std::path::Path::new(path).parent();
                if let Some(parent) = parent.filter(|p| !p.as_os_str().is_empty()) {
                    if !parent.exists() {
                        return Err(DbDumpError::Connection(format!(
                            "Parent directory does not exist: {}",
                            parent.display()
                        )));
                    }
                }
            }

            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                DbDumpError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            DbDumpError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;

        tracing::info!(path = %path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Execute a script of several statements, e.g. a generated dump
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!(bytes = sql.len(), "executing SQL batch");
        self.with_conn(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| DbDumpError::Query(format!("Failed to execute batch: {}", e)))
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&RusqliteConnection) -> Result<T>) -> Result<T> {
        let guard = self.conn.try_lock().ok_or_else(busy)?;
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(DbDumpError::Connection("connection is closed".into())),
        }
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let rusqlite_params = values_to_rusqlite(params);
        let rows_affected = self.with_conn(|conn| {
            conn.execute(sql, params_from_iter(rusqlite_params.iter()))
                .map_err(|e| DbDumpError::Query(format!("Failed to execute statement: {}", e)))
        })?;

        tracing::debug!(affected_rows = rows_affected, "statement executed");
        Ok(StatementResult {
            affected_rows: rows_affected as u64,
        })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();
        let rusqlite_params = values_to_rusqlite(params);

        let (columns, rows) = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| DbDumpError::Query(format!("Failed to prepare query: {}", e)))?;

            let columns = column_metadata(&stmt);
            let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

            let mut rows = Vec::new();
            let mut query_rows = stmt
                .query(params_from_iter(rusqlite_params.iter()))
                .map_err(|e| DbDumpError::Query(format!("Failed to execute query: {}", e)))?;

            while let Some(row) = query_rows
                .next()
                .map_err(|e| DbDumpError::Query(format!("Failed to fetch row: {}", e)))?
            {
                let mut values = Vec::with_capacity(column_names.len());
                for i in 0..column_names.len() {
                    values.push(rusqlite_to_value(row, i)?);
                }
                rows.push(Row::new(column_names.clone(), values));
            }

            Ok((columns, rows))
        })?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );
        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms,
        })
    }

    async fn open_cursor(&self, sql: &str) -> Result<Box<dyn RowCursor>> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "opening cursor");
        let cursor = SqliteCursor::open(self.conn.clone(), sql.to_string()).await?;
        Ok(Box::new(cursor))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing SQLite connection");
        let conn = self.conn.try_lock().ok_or_else(busy)?.take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| {
                DbDumpError::Connection(format!("Failed to close connection: {}", e))
            })?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        // Busy means a cursor holds the handle, so it is still open.
        self.conn.try_lock().is_some_and(|guard| guard.is_none())
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

pub(crate) fn busy() -> DbDumpError {
    DbDumpError::Connection("connection is busy with an open cursor".into())
}

/// Result column metadata of a prepared statement
///
/// decl_type is only known for result columns that map directly onto a table
/// column; computed expressions report no type.
pub(crate) fn column_metadata(stmt: &Statement<'_>) -> Vec<ColumnMeta> {
    stmt.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| ColumnMeta::new(col.name(), col.decl_type().unwrap_or(""), idx))
        .collect()
}

fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Int32(i) => Sql::Integer(*i as i64),
        Value::Int64(i) => Sql::Integer(*i),
        Value::Float64(f) => Sql::Real(*f),
        Value::Decimal(d) => Sql::Text(d.clone()),
        Value::String(s) => Sql::Text(s.clone()),
        Value::Bytes(b) => Sql::Blob(b.clone()),
        Value::Date(d) => Sql::Text(d.to_string()),
        Value::Time(t) => Sql::Text(t.to_string()),
        Value::DateTime(dt) => Sql::Text(dt.to_string()),
        Value::Json(j) => Sql::Text(j.to_string()),
    }
}

pub(crate) fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| DbDumpError::Query(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}
