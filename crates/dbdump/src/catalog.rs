//! Catalog reader
//!
//! Thin query layer over the connection's `SchemaIntrospection` capability.
//! Each operation issues its own metadata queries and maps the result into
//! the dump model; nothing is cached between calls.

use dbdump_core::{
    Connection, DbDumpError, Result, RowCursor, SchemaIntrospection, SourceInfo, TableType, Value,
};

use crate::error::DumpError;
use crate::model::{Column, ForeignKey, Index, IndexColumn, Table};
use crate::options::DumpOptions;
use crate::sql::quote_identifier;

pub struct CatalogReader<'a> {
    connection: &'a dyn Connection,
    introspection: &'a dyn SchemaIntrospection,
    options: &'a DumpOptions,
}

impl<'a> CatalogReader<'a> {
    pub fn new(
        connection: &'a dyn Connection,
        options: &'a DumpOptions,
    ) -> std::result::Result<Self, DumpError> {
        let introspection = connection.as_schema_introspection().ok_or_else(|| {
            DumpError::SchemaIntrospectionNotSupported(connection.driver_name().to_string())
        })?;
        Ok(Self {
            connection,
            introspection,
            options,
        })
    }

    fn schema(&self) -> Option<&str> {
        self.options.schema.as_deref()
    }

    /// Ordinary tables, after the configured include/exclude filters
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        tracing::trace!(schema = ?self.schema(), "listing tables");
        let tables = self.introspection.list_tables(self.schema()).await?;
        Ok(tables
            .into_iter()
            .filter(|t| t.table_type == TableType::Table)
            .map(|t| t.name)
            .filter(|name| self.options.should_include_table(name))
            .collect())
    }

    pub async fn list_views(&self) -> Result<Vec<String>> {
        tracing::trace!(schema = ?self.schema(), "listing views");
        let views = self.introspection.list_views(self.schema()).await?;
        Ok(views.into_iter().map(|v| v.name).collect())
    }

    pub async fn columns_of(&self, table: &str) -> Result<Vec<Column>> {
        tracing::trace!(table = %table, "reading columns");
        let mut columns = self.introspection.get_columns(self.schema(), table).await?;
        columns.sort_by_key(|c| c.ordinal);
        Ok(columns
            .into_iter()
            .map(|c| Column::new(c.name, c.data_type, c.nullable))
            .collect())
    }

    /// Primary key columns in key order; empty when the table has no key
    pub async fn primary_key_of(&self, table: &str) -> Result<Vec<String>> {
        tracing::trace!(table = %table, "reading primary key");
        Ok(self
            .introspection
            .get_primary_key(self.schema(), table)
            .await?
            .map(|pk| pk.columns)
            .unwrap_or_default())
    }

    /// One edge per key column; edges of a composite key share a constraint
    pub async fn foreign_keys_of(&self, table: &str) -> Result<Vec<ForeignKey>> {
        tracing::trace!(table = %table, "reading foreign keys");
        let foreign_keys = self.introspection.get_foreign_keys(self.schema(), table).await?;

        let mut edges = Vec::new();
        for fk in foreign_keys {
            if fk.columns.len() != fk.referenced_columns.len() {
                return Err(DbDumpError::Schema(format!(
                    "foreign key '{}' on '{}' has {} columns but references {}",
                    fk.name,
                    table,
                    fk.columns.len(),
                    fk.referenced_columns.len()
                )));
            }
            for (column, referenced_column) in fk.columns.into_iter().zip(fk.referenced_columns) {
                edges.push(
                    ForeignKey::new(column, fk.referenced_table.clone(), referenced_column)
                        .in_constraint(fk.name.clone()),
                );
            }
        }
        Ok(edges)
    }

    /// Indexes of a table, implicit ones included and flagged
    ///
    /// Indexes with expression key parts cannot be expressed as column lists
    /// and are left out.
    pub async fn indexes_of(&self, table: &str) -> Result<Vec<Index>> {
        tracing::trace!(table = %table, "reading indexes");
        let indexes = self.introspection.get_indexes(self.schema(), table).await?;

        let mut result = Vec::with_capacity(indexes.len());
        for index in indexes {
            let columns: Option<Vec<IndexColumn>> = index
                .columns
                .iter()
                .map(|c| c.name.as_ref().map(|name| IndexColumn::new(name.clone(), c.order)))
                .collect();
            let Some(columns) = columns else {
                tracing::warn!(
                    table = %table,
                    index = %index.name,
                    "skipping index with expression key parts"
                );
                continue;
            };
            result.push(Index {
                name: index.name,
                table: table.to_string(),
                columns,
                unique: index.is_unique,
                implicit: index.is_implicit,
            });
        }
        Ok(result)
    }

    pub async fn driver_summary(&self) -> Result<SourceInfo> {
        self.introspection.source_info().await
    }

    /// Full table definition: columns, primary key and foreign keys
    pub async fn table(&self, name: &str) -> Result<Table> {
        Ok(Table {
            name: name.to_string(),
            columns: self.columns_of(name).await?,
            primary_key: self.primary_key_of(name).await?,
            foreign_keys: self.foreign_keys_of(name).await?,
        })
    }

    /// Table shape of a view, taken from `SELECT *` over it
    ///
    /// Columns the source reports no declared type for get one inferred from
    /// their first non-null value. The cursor is released as soon as every
    /// such column has been typed.
    pub async fn view(&self, name: &str) -> Result<Table> {
        let mut cursor = self.open_select(name).await?;
        let inferred = infer_view_columns(cursor.as_mut()).await;
        let released = cursor.close().await;
        let columns = match (inferred, released) {
            (Ok(columns), Ok(())) => columns,
            (Ok(_), Err(e)) | (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(release)) => {
                tracing::error!(view = %name, error = %release, "cursor release failed after fetch failure");
                return Err(e);
            }
        };

        Ok(Table {
            name: name.to_string(),
            columns,
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        })
    }

    /// `SELECT *` cursor over a table or view
    pub async fn open_select(&self, name: &str) -> Result<Box<dyn RowCursor>> {
        let source = match self.schema() {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(name)),
            None => quote_identifier(name),
        };
        self.connection
            .open_cursor(&format!("SELECT * FROM {}", source))
            .await
    }
}

async fn infer_view_columns(cursor: &mut dyn RowCursor) -> Result<Vec<Column>> {
    let mut columns: Vec<Column> = cursor
        .columns()
        .iter()
        .map(|c| Column::new(c.name.clone(), c.data_type.clone(), c.nullable))
        .collect();

    let mut untyped: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.data_type.is_empty())
        .map(|(idx, _)| idx)
        .collect();

    while !untyped.is_empty() {
        let Some(row) = cursor.next_row().await? else {
            break;
        };
        untyped.retain(|&idx| match row.get(idx).and_then(type_of_value) {
            Some(ty) => {
                columns[idx].data_type = ty.to_string();
                false
            }
            None => true,
        });
    }

    for idx in untyped {
        columns[idx].data_type = "TEXT".to_string();
    }
    Ok(columns)
}

fn type_of_value(value: &Value) -> Option<&'static str> {
    match value {
        Value::Null => None,
        Value::Bool(_) | Value::Int32(_) | Value::Int64(_) => Some("INTEGER"),
        Value::Float64(_) | Value::Decimal(_) => Some("REAL"),
        Value::Bytes(_) => Some("BLOB"),
        _ => Some("TEXT"),
    }
}
