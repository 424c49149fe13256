//! DDL rendering
//!
//! Stateless functions from the [`Table`]/[`Index`] model to SQL text. Every
//! identifier is double-quoted.

use dbdump_core::SortOrder;

use crate::model::{Column, ForeignKey, Index, Table};
use crate::sql::quote_identifier;

/// `DROP TABLE IF EXISTS` followed by `CREATE TABLE` for a table
pub fn render_table_ddl(table: &Table) -> String {
    tracing::debug!(table = %table.name, column_count = table.columns.len(), "rendering table DDL");
    render_create(&table.name, table)
}

/// Same shape as [`render_table_ddl`], for a view snapshotted under
/// `<prefix><view name>`. Keys are never rendered for views.
pub fn render_view_ddl(view: &Table, prefix: &str) -> String {
    tracing::debug!(view = %view.name, column_count = view.columns.len(), "rendering view DDL");
    render_create(&format!("{}{}", prefix, view.name), view)
}

/// One `CREATE [UNIQUE] INDEX` per non-implicit index
pub fn render_indexes(indexes: &[Index]) -> Vec<String> {
    indexes
        .iter()
        .filter(|index| !index.implicit)
        .map(render_index)
        .collect()
}

fn render_create(name: &str, table: &Table) -> String {
    let quoted = quote_identifier(name);
    let mut lines: Vec<String> = table.columns.iter().map(column_definition).collect();

    if !table.primary_key.is_empty() {
        let columns: Vec<String> = table.primary_key.iter().map(|c| quote_identifier(c)).collect();
        lines.push(format!("    PRIMARY KEY ({})", columns.join(", ")));
    }

    for group in foreign_key_groups(&table.foreign_keys) {
        let columns: Vec<String> = group.iter().map(|fk| quote_identifier(&fk.column)).collect();
        let targets: Vec<String> = group
            .iter()
            .map(|fk| quote_identifier(&fk.referenced_column))
            .collect();
        lines.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({})",
            columns.join(", "),
            quote_identifier(&group[0].referenced_table),
            targets.join(", ")
        ));
    }

    format!(
        "DROP TABLE IF EXISTS {quoted};\nCREATE TABLE {quoted} (\n{}\n);",
        lines.join(",\n")
    )
}

fn column_definition(column: &Column) -> String {
    let mut def = format!("    {}", quote_identifier(&column.name));

    if !column.data_type.is_empty() {
        def.push(' ');
        def.push_str(&column.data_type);
    }

    if !column.nullable {
        def.push_str(" NOT NULL");
    }

    def
}

/// Group edges of the same constraint into one clause, keeping first-edge
/// order. Edges without a constraint id each form their own clause.
fn foreign_key_groups(foreign_keys: &[ForeignKey]) -> Vec<Vec<&ForeignKey>> {
    let mut groups: Vec<Vec<&ForeignKey>> = Vec::new();
    for fk in foreign_keys {
        let existing = match &fk.constraint {
            Some(id) => groups.iter_mut().find(|group| {
                group[0].constraint.as_ref() == Some(id)
                    && group[0].referenced_table == fk.referenced_table
            }),
            None => None,
        };
        match existing {
            Some(group) => group.push(fk),
            None => groups.push(vec![fk]),
        }
    }
    groups
}

fn render_index(index: &Index) -> String {
    tracing::debug!(table = %index.table, index = %index.name, "rendering CREATE INDEX");
    let unique = if index.unique { "UNIQUE " } else { "" };
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|col| match col.direction {
            Some(SortOrder::Asc) => format!("{} ASC", quote_identifier(&col.name)),
            Some(SortOrder::Desc) => format!("{} DESC", quote_identifier(&col.name)),
            None => quote_identifier(&col.name),
        })
        .collect();

    format!(
        "CREATE {}INDEX {} ON {} ({});",
        unique,
        quote_identifier(&index.name),
        quote_identifier(&index.table),
        columns.join(", ")
    )
}
