//! Row serialization into INSERT statements

use dbdump_core::{DbDumpError, Row, RowCursor, Value};
use thiserror::Error;

use crate::model::is_integer_type;
use crate::sql::quote_literal;

/// Failure while draining a row cursor
#[derive(Debug, Error)]
pub enum InsertError {
    #[error("row fetch failed: {0}")]
    Fetch(#[source] DbDumpError),

    #[error("cursor release failed: {0}")]
    Release(#[source] DbDumpError),
}

/// Renders every row of a cursor as an `INSERT` statement
///
/// Column types come from the cursor's metadata unless overridden, which is
/// how views with computed columns get their inferred types applied.
#[derive(Debug, Clone, Default)]
pub struct RowSerializer {
    column_types: Option<Vec<String>>,
}

impl RowSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these type names by position instead of the cursor's
    pub fn with_column_types(column_types: Vec<String>) -> Self {
        Self {
            column_types: Some(column_types),
        }
    }

    /// Drain `cursor` into `INSERT INTO <target> VALUES(...);` statements.
    ///
    /// `target` is written verbatim and must already be quoted. The cursor is
    /// closed on every path; a release failure after a fetch failure is
    /// logged and the fetch failure returned.
    pub async fn render_inserts(
        &self,
        target: &str,
        mut cursor: Box<dyn RowCursor>,
    ) -> Result<Vec<String>, InsertError> {
        let integer_columns: Vec<bool> = cursor
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = self
                    .column_types
                    .as_ref()
                    .and_then(|types| types.get(idx))
                    .map(String::as_str)
                    .unwrap_or(&col.data_type);
                is_integer_type(declared)
            })
            .collect();

        let mut statements = Vec::new();
        let fetched = loop {
            match cursor.next_row().await {
                Ok(Some(row)) => statements.push(render_row(target, &integer_columns, &row)),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let released = cursor.close().await;

        match (fetched, released) {
            (Ok(()), Ok(())) => {
                tracing::debug!(table = %target, row_count = statements.len(), "rows serialized");
                Ok(statements)
            }
            (Ok(()), Err(release)) => Err(InsertError::Release(release)),
            (Err(fetch), Ok(())) => Err(InsertError::Fetch(fetch)),
            (Err(fetch), Err(release)) => {
                tracing::error!(
                    table = %target,
                    error = %release,
                    "cursor release failed after row fetch failure"
                );
                Err(InsertError::Fetch(fetch))
            }
        }
    }
}

/// One statement with exactly one entry per column
fn render_row(target: &str, integer_columns: &[bool], row: &Row) -> String {
    let values: Vec<String> = integer_columns
        .iter()
        .enumerate()
        .map(|(idx, &integer)| render_value(row.get(idx).unwrap_or(&Value::Null), integer))
        .collect();
    format!("INSERT INTO {} VALUES({});", target, values.join(", "))
}

fn render_value(value: &Value, integer_column: bool) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }

    if integer_column {
        // Dynamically typed sources can hold non-integers in an integer
        // column; those fall through to the quoted form.
        match value {
            Value::String(text) | Value::Decimal(text) => {
                if text.parse::<i64>().is_ok() {
                    return text.clone();
                }
            }
            other => {
                if let Some(i) = other.as_i64() {
                    return i.to_string();
                }
            }
        }
    }

    match value {
        Value::Bytes(bytes) => format!("X'{}'", hex::encode_upper(bytes)),
        other => quote_literal(&other.to_string()),
    }
}
