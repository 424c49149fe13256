//! Streaming row cursor
//!
//! A worker thread takes the connection handle for the lifetime of the cursor
//! and steps the prepared statement, handing rows to the reader over a
//! bounded channel. Closing the cursor drops the channel, which stops the
//! worker, and waits for it to give the handle back.

use async_trait::async_trait;
use dbdump_core::{ColumnMeta, DbDumpError, Result, Row, RowCursor, Value};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

use crate::connection::{SharedHandle, busy, column_metadata, rusqlite_to_value};

/// Rows fetched ahead of the reader
const ROW_BUFFER: usize = 64;

/// Cursor over the rows of one SQLite query
pub struct SqliteCursor {
    columns: Vec<ColumnMeta>,
    column_names: Vec<String>,
    rows: mpsc::Receiver<Result<Vec<Value>>>,
    worker: JoinHandle<()>,
}

impl SqliteCursor {
    pub(crate) async fn open(handle: SharedHandle, sql: String) -> Result<Self> {
        let (columns_tx, columns_rx) = oneshot::channel();
        let (rows_tx, rows_rx) = mpsc::channel(ROW_BUFFER);

        let worker = std::thread::Builder::new()
            .name("sqlite-cursor".into())
            .spawn(move || stream_rows(&handle, &sql, columns_tx, rows_tx))
            .map_err(|e| DbDumpError::Connection(format!("Failed to start cursor worker: {}", e)))?;

        let columns = match columns_rx.await {
            Ok(Ok(columns)) => columns,
            Ok(Err(e)) => {
                join(worker)?;
                return Err(e);
            }
            Err(_) => {
                join(worker)?;
                return Err(DbDumpError::Query(
                    "cursor worker exited before reporting columns".into(),
                ));
            }
        };

        Ok(Self {
            column_names: columns.iter().map(|c| c.name.clone()).collect(),
            columns,
            rows: rows_rx,
            worker,
        })
    }
}

#[async_trait]
impl RowCursor for SqliteCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        match self.rows.recv().await {
            Some(Ok(values)) => Ok(Some(Row::new(self.column_names.clone(), values))),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let Self { rows, worker, .. } = *self;
        drop(rows);
        join(worker)?;
        tracing::trace!("SQLite cursor released");
        Ok(())
    }
}

fn join(worker: JoinHandle<()>) -> Result<()> {
    worker
        .join()
        .map_err(|_| DbDumpError::Connection("cursor worker panicked".into()))
}

fn stream_rows(
    handle: &SharedHandle,
    sql: &str,
    columns_tx: oneshot::Sender<Result<Vec<ColumnMeta>>>,
    rows_tx: mpsc::Sender<Result<Vec<Value>>>,
) {
    let Some(guard) = handle.try_lock() else {
        let _ = columns_tx.send(Err(busy()));
        return;
    };
    let Some(conn) = guard.as_ref() else {
        let _ = columns_tx.send(Err(DbDumpError::Connection("connection is closed".into())));
        return;
    };

    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = columns_tx.send(Err(DbDumpError::Query(format!(
                "Failed to prepare query: {}",
                e
            ))));
            return;
        }
    };
    let columns = column_metadata(&stmt);
    let width = columns.len();
    if columns_tx.send(Ok(columns)).is_err() {
        return;
    }

    let mut rows = match stmt.query([]) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = rows_tx.blocking_send(Err(DbDumpError::Query(format!(
                "Failed to execute query: {}",
                e
            ))));
            return;
        }
    };

    let mut sent = 0usize;
    loop {
        let next = match rows.next() {
            Ok(Some(row)) => (0..width)
                .map(|idx| rusqlite_to_value(row, idx))
                .collect::<Result<Vec<_>>>(),
            Ok(None) => break,
            Err(e) => Err(DbDumpError::Query(format!("Failed to fetch row: {}", e))),
        };
        let failed = next.is_err();
        // A closed channel means the reader let go of the cursor.
        if rows_tx.blocking_send(next).is_err() || failed {
            break;
        }
        sent += 1;
    }
    tracing::debug!(row_count = sent, "cursor worker finished");
}
