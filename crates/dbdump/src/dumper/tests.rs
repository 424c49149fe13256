//! Tests for the dump orchestrator against an in-memory mock source

use super::*;
use crate::options::FailurePolicy;
use async_trait::async_trait;
use dbdump_core::{
    ColumnInfo, ColumnMeta, DbDumpError, ForeignKeyInfo, IndexColumnInfo, IndexInfo,
    PrimaryKeyInfo, QueryResult, Result as SourceResult, Row, RowCursor, SchemaIntrospection,
    SourceInfo, StatementResult, TableInfo, TableType, Value, ViewInfo,
};
use indoc::indoc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct MockObject {
    name: String,
    columns: Vec<ColumnInfo>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKeyInfo>,
    indexes: Vec<IndexInfo>,
    rows: Vec<Vec<Value>>,
}

impl MockObject {
    fn new(name: &str, columns: &[(&str, &str, bool)]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns
                .iter()
                .enumerate()
                .map(|(ordinal, (name, ty, nullable))| ColumnInfo {
                    name: name.to_string(),
                    ordinal,
                    data_type: ty.to_string(),
                    nullable: *nullable,
                    ..Default::default()
                })
                .collect(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            rows: Vec::new(),
        }
    }

    fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn references(mut self, column: &str, table: &str, target: &str) -> Self {
        self.foreign_keys.push(ForeignKeyInfo {
            name: format!("fk_{}_{}", self.name, self.foreign_keys.len()),
            columns: vec![column.to_string()],
            referenced_table: table.to_string(),
            referenced_schema: None,
            referenced_columns: vec![target.to_string()],
        });
        self
    }

    fn index(mut self, name: &str, column: &str, implicit: bool) -> Self {
        self.indexes.push(IndexInfo {
            name: name.to_string(),
            columns: vec![IndexColumnInfo {
                name: Some(column.to_string()),
                order: None,
            }],
            is_unique: implicit,
            is_implicit: implicit,
        });
        self
    }

    fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }
}

#[derive(Default)]
struct MockSource {
    tables: Vec<MockObject>,
    views: Vec<MockObject>,
    no_introspection: bool,
    fail_catalog_for: Option<String>,
    fail_rows_for: Option<String>,
    fail_indexes_for: Option<String>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl MockSource {
    fn table(&self, name: &str) -> SourceResult<&MockObject> {
        if self.fail_catalog_for.as_deref() == Some(name) {
            return Err(DbDumpError::Query(format!("catalog read of {} failed", name)));
        }
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| DbDumpError::NotFound(name.to_string()))
    }
}

struct MockCursor {
    columns: Vec<ColumnMeta>,
    rows: std::vec::IntoIter<Vec<Value>>,
    fail_after_rows: bool,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RowCursor for MockCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn next_row(&mut self) -> SourceResult<Option<Row>> {
        match self.rows.next() {
            Some(values) => {
                let names = self.columns.iter().map(|c| c.name.clone()).collect();
                Ok(Some(Row::new(names, values)))
            }
            None if self.fail_after_rows => Err(DbDumpError::Query("connection reset".into())),
            None => Ok(None),
        }
    }

    async fn close(self: Box<Self>) -> SourceResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Connection for MockSource {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> SourceResult<StatementResult> {
        Err(DbDumpError::NotSupported("execute".into()))
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> SourceResult<QueryResult> {
        Err(DbDumpError::NotSupported("query".into()))
    }

    async fn open_cursor(&self, sql: &str) -> SourceResult<Box<dyn RowCursor>> {
        let object = self
            .tables
            .iter()
            .chain(&self.views)
            .find(|o| sql == format!("SELECT * FROM {}", crate::quote_identifier(&o.name)))
            .ok_or_else(|| DbDumpError::Query(format!("unexpected query: {}", sql)))?;

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCursor {
            columns: object
                .columns
                .iter()
                .map(|c| ColumnMeta::new(c.name.clone(), c.data_type.clone(), c.ordinal))
                .collect(),
            rows: object.rows.clone().into_iter(),
            fail_after_rows: self.fail_rows_for.as_deref() == Some(object.name.as_str()),
            closed: self.closed.clone(),
        }))
    }

    async fn close(&self) -> SourceResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        if self.no_introspection {
            None
        } else {
            Some(self)
        }
    }
}

#[async_trait]
impl SchemaIntrospection for MockSource {
    async fn list_tables(&self, _schema: Option<&str>) -> SourceResult<Vec<TableInfo>> {
        let mut tables: Vec<TableInfo> = self
            .tables
            .iter()
            .map(|t| TableInfo {
                schema: None,
                name: t.name.clone(),
                table_type: TableType::Table,
            })
            .collect();
        tables.push(TableInfo {
            schema: None,
            name: "mock_catalog".into(),
            table_type: TableType::System,
        });
        Ok(tables)
    }

    async fn list_views(&self, _schema: Option<&str>) -> SourceResult<Vec<ViewInfo>> {
        Ok(self
            .views
            .iter()
            .map(|v| ViewInfo {
                schema: None,
                name: v.name.clone(),
                definition: None,
            })
            .collect())
    }

    async fn get_columns(&self, _schema: Option<&str>, table: &str) -> SourceResult<Vec<ColumnInfo>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn get_primary_key(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> SourceResult<Option<PrimaryKeyInfo>> {
        let pk = &self.table(table)?.primary_key;
        Ok((!pk.is_empty()).then(|| PrimaryKeyInfo {
            name: None,
            columns: pk.clone(),
        }))
    }

    async fn get_foreign_keys(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> SourceResult<Vec<ForeignKeyInfo>> {
        Ok(self.table(table)?.foreign_keys.clone())
    }

    async fn get_indexes(&self, _schema: Option<&str>, table: &str) -> SourceResult<Vec<IndexInfo>> {
        if self.fail_indexes_for.as_deref() == Some(table) {
            return Err(DbDumpError::Query("index catalog unavailable".into()));
        }
        Ok(self.table(table)?.indexes.clone())
    }

    async fn source_info(&self) -> SourceResult<SourceInfo> {
        Ok(SourceInfo {
            product_name: "MockDB".into(),
            product_version: "1.0".into(),
            driver_name: "mock".into(),
            driver_version: "0.0.1".into(),
        })
    }
}

/// `orders` is declared before the `customers` table it references
fn shop() -> MockSource {
    MockSource {
        tables: vec![
            MockObject::new(
                "orders",
                &[
                    ("id", "INTEGER", false),
                    ("customer_id", "INTEGER", true),
                    ("note", "TEXT", true),
                ],
            )
            .primary_key(&["id"])
            .references("customer_id", "customers", "id")
            .index("sqlite_autoindex_orders_1", "id", true)
            .index("idx_orders_customer", "customer_id", false)
            .row(vec![Value::Int64(10), Value::Int64(1), Value::Null]),
            MockObject::new("customers", &[("id", "INTEGER", false), ("name", "TEXT", true)])
                .primary_key(&["id"])
                .row(vec![Value::Int64(1), Value::String("O'Brien".into())]),
        ],
        views: vec![
            MockObject::new("active_users", &[("id", "INTEGER", true), ("name", "", true)])
                .row(vec![Value::Int64(1), Value::String("O'Brien".into())]),
        ],
        ..Default::default()
    }
}

fn dumper(source: MockSource, options: DumpOptions) -> (SqlDumper, Arc<MockSource>) {
    let source = Arc::new(source);
    (SqlDumper::new(source.clone(), options), source)
}

mod full_dump_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_full_dump_layout() {
        let (dumper, _) = dumper(shop(), DumpOptions::default());
        let script = dumper.dump_string().await.unwrap();

        assert_eq!(
            script,
            indoc! {r#"
                -- Source: MockDB 1.0
                -- Driver: mock 0.0.1
                ---
                DROP TABLE IF EXISTS "customers";
                CREATE TABLE "customers" (
                    "id" INTEGER NOT NULL,
                    "name" TEXT,
                    PRIMARY KEY ("id")
                );
                ---
                DROP TABLE IF EXISTS "orders";
                CREATE TABLE "orders" (
                    "id" INTEGER NOT NULL,
                    "customer_id" INTEGER,
                    "note" TEXT,
                    PRIMARY KEY ("id"),
                    FOREIGN KEY ("customer_id") REFERENCES "customers"("id")
                );
                ---
                INSERT INTO "customers" VALUES(1, 'O''Brien');
                ---
                INSERT INTO "orders" VALUES(10, 1, NULL);
                ---
                CREATE INDEX "idx_orders_customer" ON "orders" ("customer_id");
                ---
                -- Views:
                DROP TABLE IF EXISTS "view_active_users";
                CREATE TABLE "view_active_users" (
                    "id" INTEGER,
                    "name" TEXT
                );
                ---
                INSERT INTO "view_active_users" VALUES(1, 'O''Brien');
                ---
            "#}
        );
    }

    #[tokio::test]
    async fn test_every_cursor_is_closed() {
        let (dumper, source) = dumper(shop(), DumpOptions::default());
        dumper.dump_string().await.unwrap();

        // two table cursors, one view inference cursor, one view insert cursor
        assert_eq!(source.opened.load(Ordering::SeqCst), 4);
        assert_eq!(source.closed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_schema_only_has_no_inserts() {
        let (dumper, _) = dumper(shop(), DumpOptions::schema_only());
        let script = dumper.dump_string().await.unwrap();

        assert!(!script.contains("INSERT INTO"));
        assert!(script.contains("CREATE TABLE \"view_active_users\""));
        assert!(script.contains("CREATE INDEX"));
    }

    #[tokio::test]
    async fn test_excluded_table_is_absent() {
        let options = DumpOptions::default()
            .excluding(vec!["orders".into()])
            .without_views();
        let (dumper, _) = dumper(shop(), options);
        let script = dumper.dump_string().await.unwrap();

        assert!(!script.contains("\"orders\""));
        assert!(!script.contains("-- Views:"));
        assert!(script.contains("INSERT INTO \"customers\""));
    }

    #[tokio::test]
    async fn test_cycle_is_reported_after_header() {
        let source = MockSource {
            tables: vec![
                MockObject::new("a", &[("b_id", "INTEGER", true)]).references("b_id", "b", "id"),
                MockObject::new("b", &[("a_id", "INTEGER", true)]).references("a_id", "a", "id"),
            ],
            ..Default::default()
        };
        let (dumper, _) = dumper(source, DumpOptions::default().without_views());
        let script = dumper.dump_string().await.unwrap();

        assert!(script.starts_with(indoc! {r#"
            -- Source: MockDB 1.0
            -- Driver: mock 0.0.1
            -- foreign key cycle: "a" placed before "b"
            ---
            DROP TABLE IF EXISTS "a";
        "#}));
    }

    #[tokio::test]
    async fn test_sorted_table_names() {
        let (dumper, _) = dumper(shop(), DumpOptions::default());
        let order = dumper.sorted_table_names().await.unwrap();
        assert_eq!(order.order, vec!["customers", "orders"]);
        assert!(order.is_acyclic());
    }
}

mod capability_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_listing_filters_non_tables() {
        let (dumper, _) = dumper(shop(), DumpOptions::default());
        assert_eq!(dumper.table_names().await.unwrap(), vec!["orders", "customers"]);
        assert_eq!(dumper.view_names().await.unwrap(), vec!["active_users"]);
    }

    #[tokio::test]
    async fn test_per_object_operations() {
        let (dumper, _) = dumper(shop(), DumpOptions::default());

        assert!(dumper.ddl_for_table("orders").await.unwrap().contains("FOREIGN KEY"));
        assert!(
            dumper
                .ddl_for_view("active_users")
                .await
                .unwrap()
                .starts_with("DROP TABLE IF EXISTS \"view_active_users\";")
        );
        assert_eq!(
            dumper.inserts_for_view("active_users").await.unwrap(),
            vec![r#"INSERT INTO "view_active_users" VALUES(1, 'O''Brien');"#]
        );
        assert_eq!(
            dumper.indexes_for_table("orders").await.unwrap(),
            vec![r#"CREATE INDEX "idx_orders_customer" ON "orders" ("customer_id");"#]
        );
        assert_eq!(
            dumper.inserts_for_table("orders").await.unwrap(),
            vec![r#"INSERT INTO "orders" VALUES(10, 1, NULL);"#]
        );
    }

    #[tokio::test]
    async fn test_missing_introspection_is_an_error() {
        let source = MockSource {
            no_introspection: true,
            ..shop()
        };
        let (dumper, _) = dumper(source, DumpOptions::default());
        let err = dumper.dump_string().await.unwrap_err();
        assert!(matches!(err, DumpError::SchemaIntrospectionNotSupported(ref d) if d == "mock"));
    }

    #[test]
    fn test_dump_blocking() {
        let source: Arc<dyn Connection> = Arc::new(shop());
        let script = dump_blocking(source, DumpOptions::default()).unwrap();
        assert!(script.contains("INSERT INTO \"view_active_users\""));
    }
}

mod failure_policy_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::error::{DumpOperation, ObjectKind};

    #[tokio::test]
    async fn test_abort_names_table_and_operation() {
        let source = MockSource {
            fail_rows_for: Some("orders".into()),
            ..shop()
        };
        let (dumper, source) = dumper(source, DumpOptions::default());
        let err = dumper.dump_string().await.unwrap_err();

        assert!(matches!(
            &err,
            DumpError::Object {
                kind: ObjectKind::Table,
                operation: DumpOperation::Inserts,
                name,
                ..
            } if name == "orders"
        ));
        assert_eq!(
            source.opened.load(Ordering::SeqCst),
            source.closed.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_annotate_keeps_going_and_summarizes() {
        let source = MockSource {
            fail_rows_for: Some("orders".into()),
            fail_indexes_for: Some("orders".into()),
            ..shop()
        };
        let options = DumpOptions::default().with_failure_policy(FailurePolicy::Annotate);
        let (dumper, _) = dumper(source, options);
        let script = dumper.dump_string().await.unwrap();

        assert!(script.contains("CREATE TABLE \"orders\""));
        assert!(script.contains("INSERT INTO \"customers\" VALUES(1, 'O''Brien');"));
        assert!(!script.contains("INSERT INTO \"orders\""));
        assert!(!script.contains("CREATE INDEX"));
        assert!(script.contains("INSERT INTO \"view_active_users\""));
        assert!(script.ends_with(indoc! {r#"
            -- Dump incomplete: 2 failure(s)
            -- table "orders": inserts failed: Query error: connection reset
            -- table "orders": indexes failed: Query error: index catalog unavailable
        "#}));
    }

    #[tokio::test]
    async fn test_annotate_drops_table_whose_catalog_failed() {
        let source = MockSource {
            fail_catalog_for: Some("customers".into()),
            ..shop()
        };
        let options = DumpOptions::default()
            .with_failure_policy(FailurePolicy::Annotate)
            .without_views();
        let (dumper, _) = dumper(source, options);
        let script = dumper.build_script().await.unwrap();

        assert_eq!(script.table_ddl.len(), 1);
        assert!(script.table_ddl[0].contains("\"orders\""));
        assert!(script.table_inserts.iter().all(|s| !s.contains("customers")));
        assert_eq!(
            script.failures,
            vec![
                "table \"customers\": catalog failed: Query error: catalog read of customers failed"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_abort_on_catalog_failure() {
        let source = MockSource {
            fail_catalog_for: Some("customers".into()),
            ..shop()
        };
        let (dumper, _) = dumper(source, DumpOptions::default());
        let err = dumper.dump_string().await.unwrap_err();
        assert_eq!(err.object_name(), Some("customers"));
    }
}
