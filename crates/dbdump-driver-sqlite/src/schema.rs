//! SQLite schema introspection
//!
//! Catalog metadata comes from `sqlite_master` and the pragma table-valued
//! functions, with object names bound as parameters so unusual identifiers
//! need no quoting.

use async_trait::async_trait;
use dbdump_core::{
    ColumnInfo, Connection, DbDumpError, ForeignKeyInfo, IndexColumnInfo, IndexInfo,
    PrimaryKeyInfo, Result, Row, SchemaIntrospection, SortOrder, SourceInfo, TableInfo, TableType,
    Value, ViewInfo,
};
use std::collections::BTreeMap;

use crate::SqliteConnection;

/// Prefix SQLite reserves for its own objects (`sqlite_sequence`,
/// `sqlite_stat1`, `sqlite_autoindex_*`, ...)
const INTERNAL_PREFIX: &str = "sqlite_";

#[async_trait]
impl SchemaIntrospection for SqliteConnection {
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, _schema: Option<&str>) -> Result<Vec<TableInfo>> {
        tracing::trace!("listing tables from sqlite_master");
        let result = self
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                &[],
            )
            .await?;

        let mut tables = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            let name = required_text(row, 0, "table name")?;
            if name.starts_with(INTERNAL_PREFIX) {
                continue;
            }
            tables.push(TableInfo {
                schema: Some("main".to_string()),
                name,
                table_type: TableType::Table,
            });
        }

        tracing::debug!(table_count = tables.len(), "tables listed");
        Ok(tables)
    }

    #[tracing::instrument(skip(self))]
    async fn list_views(&self, _schema: Option<&str>) -> Result<Vec<ViewInfo>> {
        let result = self
            .query(
                "SELECT name, sql FROM sqlite_master WHERE type = 'view' ORDER BY name",
                &[],
            )
            .await?;

        result
            .rows
            .iter()
            .map(|row| {
                Ok(ViewInfo {
                    schema: Some("main".to_string()),
                    name: required_text(row, 0, "view name")?,
                    definition: optional_text(row, 1),
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn get_columns(&self, _schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>> {
        tracing::trace!(table = %table, "fetching column information");
        let result = self
            .query(
                "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
                &[Value::String(table.to_string())],
            )
            .await?;

        if result.rows.is_empty() {
            return Err(DbDumpError::NotFound(format!("Table '{}' not found", table)));
        }

        result
            .rows
            .iter()
            .map(|row| {
                Ok(ColumnInfo {
                    ordinal: integer(row, 0).unwrap_or(0) as usize,
                    name: required_text(row, 1, "column name")?,
                    data_type: optional_text(row, 2).unwrap_or_default(),
                    nullable: integer(row, 3).unwrap_or(0) == 0,
                    default_value: row.get(4).filter(|v| !v.is_null()).map(|v| v.to_string()),
                    is_primary_key: integer(row, 5).unwrap_or(0) > 0,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn get_primary_key(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Option<PrimaryKeyInfo>> {
        let result = self
            .query(
                "SELECT name, pk FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
                &[Value::String(table.to_string())],
            )
            .await?;

        let columns = result
            .rows
            .iter()
            .map(|row| required_text(row, 0, "primary key column"))
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            Ok(None)
        } else {
            Ok(Some(PrimaryKeyInfo {
                name: None,
                columns,
            }))
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_foreign_keys(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyInfo>> {
        tracing::trace!(table = %table, "fetching foreign key information");
        let result = self
            .query(
                "SELECT id, seq, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
                &[Value::String(table.to_string())],
            )
            .await?;

        // One catalog row per key column; rows sharing an id form one constraint.
        let mut grouped: BTreeMap<i64, ForeignKeyInfo> = BTreeMap::new();
        let mut implicit_targets: Vec<(i64, usize)> = Vec::new();

        for row in &result.rows {
            let id = integer(row, 0).unwrap_or(0);
            let referenced_table = required_text(row, 2, "referenced table")?;
            let column = required_text(row, 3, "foreign key column")?;
            let fk = grouped.entry(id).or_insert_with(|| ForeignKeyInfo {
                name: format!("fk_{}_{}", table, id),
                columns: Vec::new(),
                referenced_table: referenced_table.clone(),
                referenced_schema: Some("main".to_string()),
                referenced_columns: Vec::new(),
            });
            fk.columns.push(column);
            match optional_text(row, 4) {
                Some(target) => fk.referenced_columns.push(target),
                None => {
                    // `REFERENCES parent` without a column list targets the
                    // parent's primary key.
                    implicit_targets.push((id, fk.referenced_columns.len()));
                    fk.referenced_columns.push(String::new());
                }
            }
        }

        for (id, position) in implicit_targets {
            let Some(fk) = grouped.get_mut(&id) else {
                continue;
            };
            let key = self.get_primary_key(None, &fk.referenced_table).await?;
            let target = key
                .and_then(|pk| pk.columns.get(position).cloned())
                .ok_or_else(|| {
                    DbDumpError::Schema(format!(
                        "foreign key '{}' references the primary key of '{}', which has no column at position {}",
                        fk.name, fk.referenced_table, position
                    ))
                })?;
            fk.referenced_columns[position] = target;
        }

        Ok(grouped.into_values().collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_indexes(&self, _schema: Option<&str>, table: &str) -> Result<Vec<IndexInfo>> {
        tracing::trace!(table = %table, "fetching index information");
        let result = self
            .query(
                "SELECT name, \"unique\", origin FROM pragma_index_list(?1) ORDER BY seq DESC",
                &[Value::String(table.to_string())],
            )
            .await?;

        let mut indexes = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            let name = required_text(row, 0, "index name")?;
            let is_unique = integer(row, 1).unwrap_or(0) == 1;
            // origin: 'c' = CREATE INDEX, 'u' = UNIQUE constraint, 'pk' = PRIMARY KEY
            let origin = optional_text(row, 2).unwrap_or_default();
            let is_implicit = origin != "c" || name.starts_with("sqlite_autoindex_");

            let cols_result = self
                .query(
                    "SELECT name, \"desc\" FROM pragma_index_xinfo(?1) WHERE key = 1 ORDER BY seqno",
                    &[Value::String(name.clone())],
                )
                .await?;

            // SQLite records DESC but does not distinguish an explicit ASC from
            // the default, so only DESC is reported as an explicit order.
            let columns = cols_result
                .rows
                .iter()
                .map(|r| IndexColumnInfo {
                    name: optional_text(r, 0),
                    order: (integer(r, 1).unwrap_or(0) == 1).then_some(SortOrder::Desc),
                })
                .collect();

            indexes.push(IndexInfo {
                name,
                columns,
                is_unique,
                is_implicit,
            });
        }

        Ok(indexes)
    }

    async fn source_info(&self) -> Result<SourceInfo> {
        let result = self.query("SELECT sqlite_version()", &[]).await?;
        let product_version = result
            .rows
            .first()
            .and_then(|row| optional_text(row, 0))
            .ok_or_else(|| DbDumpError::Query("sqlite_version() returned no value".into()))?;

        Ok(SourceInfo {
            product_name: "SQLite".to_string(),
            product_version,
            driver_name: env!("CARGO_PKG_NAME").to_string(),
            driver_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

fn optional_text(row: &Row, idx: usize) -> Option<String> {
    row.get(idx).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn required_text(row: &Row, idx: usize, what: &str) -> Result<String> {
    optional_text(row, idx)
        .ok_or_else(|| DbDumpError::Schema(format!("catalog row is missing the {}", what)))
}

fn integer(row: &Row, idx: usize) -> Option<i64> {
    row.get(idx).and_then(|v| v.as_i64())
}
