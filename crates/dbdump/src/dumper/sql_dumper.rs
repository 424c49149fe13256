//! Generic dumper over a `Connection` with schema introspection

use async_trait::async_trait;
use dbdump_core::Connection;
use std::collections::HashMap;
use std::sync::Arc;

use super::{DatabaseDumper, DumpScript};
use crate::catalog::CatalogReader;
use crate::ddl::{render_indexes, render_table_ddl, render_view_ddl};
use crate::dependencies::{DependencyGraph, DependencyOrder};
use crate::error::{DumpError, DumpOperation, ObjectKind};
use crate::inserts::RowSerializer;
use crate::model::Table;
use crate::options::{DumpOptions, FailurePolicy};
use crate::sql::quote_identifier;

/// Dumper that works with any `Connection` + `SchemaIntrospection`
///
/// All queries run sequentially on the one connection.
pub struct SqlDumper {
    connection: Arc<dyn Connection>,
    options: DumpOptions,
}

impl SqlDumper {
    pub fn new(connection: Arc<dyn Connection>, options: DumpOptions) -> Self {
        Self {
            connection,
            options,
        }
    }

    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    fn catalog(&self) -> Result<CatalogReader<'_>, DumpError> {
        CatalogReader::new(self.connection.as_ref(), &self.options)
    }

    /// Table names in dependency order, with any cycle breaks
    ///
    /// Any catalog failure aborts, regardless of the failure policy.
    pub async fn sorted_table_names(&self) -> Result<DependencyOrder, DumpError> {
        let catalog = self.catalog()?;
        let mut tables = Vec::new();
        for name in catalog.list_tables().await? {
            let table = catalog.table(&name).await.map_err(|e| {
                DumpError::object(ObjectKind::Table, &name, DumpOperation::Catalog, e)
            })?;
            tables.push(table);
        }
        Ok(DependencyGraph::from_tables(&tables).resolve())
    }

    /// Run the dump and return it section by section
    pub async fn build_script(&self) -> Result<DumpScript, DumpError> {
        self.options.validate()?;
        let catalog = self.catalog()?;
        let policy = self.options.failure_policy;
        let mut failures: Vec<DumpError> = Vec::new();

        tracing::info!(driver = %self.connection.driver_name(), "starting dump");
        let source = catalog.driver_summary().await?;
        let mut script = DumpScript::new(&source);

        let mut tables = Vec::new();
        for name in catalog.list_tables().await? {
            match catalog.table(&name).await {
                Ok(table) => tables.push(table),
                Err(e) => absorb(
                    policy,
                    &mut failures,
                    DumpError::object(ObjectKind::Table, &name, DumpOperation::Catalog, e),
                )?,
            }
        }

        let resolved = DependencyGraph::from_tables(&tables).resolve();
        script.diagnostics = resolved.cycle_breaks.iter().map(ToString::to_string).collect();
        let mut by_name: HashMap<String, Table> =
            tables.into_iter().map(|t| (t.name.clone(), t)).collect();
        let ordered: Vec<Table> = resolved
            .order
            .iter()
            .filter_map(|name| by_name.remove(name))
            .collect();

        for table in &ordered {
            script.table_ddl.push(render_table_ddl(table));
        }

        if self.options.include_data {
            for table in &ordered {
                match self.table_inserts(&catalog, &table.name).await {
                    Ok(statements) => script.table_inserts.extend(statements),
                    Err(e) => absorb(policy, &mut failures, e)?,
                }
            }
        }

        if self.options.include_indexes {
            for table in &ordered {
                match self.table_indexes(&catalog, &table.name).await {
                    Ok(statements) => script.indexes.extend(statements),
                    Err(e) => absorb(policy, &mut failures, e)?,
                }
            }
        }

        let mut view_count = 0;
        if self.options.include_views {
            script.views_included = true;
            let mut views = Vec::new();
            for name in catalog.list_views().await? {
                match catalog.view(&name).await {
                    Ok(view) => {
                        script
                            .view_ddl
                            .push(render_view_ddl(&view, &self.options.view_prefix));
                        views.push(view);
                    }
                    Err(e) => absorb(
                        policy,
                        &mut failures,
                        DumpError::object(ObjectKind::View, &name, DumpOperation::Ddl, e),
                    )?,
                }
            }

            if self.options.include_data {
                for view in &views {
                    match self.view_inserts(&catalog, view).await {
                        Ok(statements) => script.view_inserts.extend(statements),
                        Err(e) => absorb(policy, &mut failures, e)?,
                    }
                }
            }
            view_count = views.len();
        }

        script.failures = failures.iter().map(ToString::to_string).collect();
        tracing::info!(
            tables = ordered.len(),
            views = view_count,
            failures = failures.len(),
            "dump finished"
        );
        Ok(script)
    }

    async fn table_inserts(
        &self,
        catalog: &CatalogReader<'_>,
        table: &str,
    ) -> Result<Vec<String>, DumpError> {
        let cursor = catalog.open_select(table).await.map_err(|e| {
            DumpError::object(ObjectKind::Table, table, DumpOperation::Inserts, e)
        })?;
        RowSerializer::new()
            .render_inserts(&quote_identifier(table), cursor)
            .await
            .map_err(|e| DumpError::from_inserts(ObjectKind::Table, table, e))
    }

    async fn view_inserts(
        &self,
        catalog: &CatalogReader<'_>,
        view: &Table,
    ) -> Result<Vec<String>, DumpError> {
        let cursor = catalog.open_select(&view.name).await.map_err(|e| {
            DumpError::object(ObjectKind::View, &view.name, DumpOperation::Inserts, e)
        })?;
        let target = quote_identifier(&format!("{}{}", self.options.view_prefix, view.name));
        let column_types = view.columns.iter().map(|c| c.data_type.clone()).collect();
        RowSerializer::with_column_types(column_types)
            .render_inserts(&target, cursor)
            .await
            .map_err(|e| DumpError::from_inserts(ObjectKind::View, &view.name, e))
    }

    async fn table_indexes(
        &self,
        catalog: &CatalogReader<'_>,
        table: &str,
    ) -> Result<Vec<String>, DumpError> {
        let indexes = catalog.indexes_of(table).await.map_err(|e| {
            DumpError::object(ObjectKind::Table, table, DumpOperation::Indexes, e)
        })?;
        Ok(render_indexes(&indexes))
    }
}

/// Apply the failure policy: abort with the error, or record it and go on
fn absorb(
    policy: FailurePolicy,
    failures: &mut Vec<DumpError>,
    error: DumpError,
) -> Result<(), DumpError> {
    match policy {
        FailurePolicy::Abort => Err(error),
        FailurePolicy::Annotate => {
            tracing::error!(error = %error, "dump step failed, continuing");
            failures.push(error);
            Ok(())
        }
    }
}

#[async_trait]
impl DatabaseDumper for SqlDumper {
    async fn table_names(&self) -> Result<Vec<String>, DumpError> {
        Ok(self.catalog()?.list_tables().await?)
    }

    async fn view_names(&self) -> Result<Vec<String>, DumpError> {
        Ok(self.catalog()?.list_views().await?)
    }

    async fn ddl_for_table(&self, table: &str) -> Result<String, DumpError> {
        let model = self.catalog()?.table(table).await.map_err(|e| {
            DumpError::object(ObjectKind::Table, table, DumpOperation::Ddl, e)
        })?;
        Ok(render_table_ddl(&model))
    }

    async fn ddl_for_view(&self, view: &str) -> Result<String, DumpError> {
        let model = self.catalog()?.view(view).await.map_err(|e| {
            DumpError::object(ObjectKind::View, view, DumpOperation::Ddl, e)
        })?;
        Ok(render_view_ddl(&model, &self.options.view_prefix))
    }

    async fn inserts_for_table(&self, table: &str) -> Result<Vec<String>, DumpError> {
        self.table_inserts(&self.catalog()?, table).await
    }

    async fn inserts_for_view(&self, view: &str) -> Result<Vec<String>, DumpError> {
        let catalog = self.catalog()?;
        let model = catalog.view(view).await.map_err(|e| {
            DumpError::object(ObjectKind::View, view, DumpOperation::Inserts, e)
        })?;
        self.view_inserts(&catalog, &model).await
    }

    async fn indexes_for_table(&self, table: &str) -> Result<Vec<String>, DumpError> {
        self.table_indexes(&self.catalog()?, table).await
    }

    async fn dump_string(&self) -> Result<String, DumpError> {
        let script = self.build_script().await?;
        Ok(script.render(&self.options.separator))
    }
}
