//! Structured dump output and its text rendering

use dbdump_core::SourceInfo;

/// A dump, section by section, before it is flattened into text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpScript {
    /// Header comment lines (without the `-- ` marker)
    pub header: Vec<String>,
    /// Comment lines rendered right after the header, e.g. cycle breaks
    pub diagnostics: Vec<String>,
    /// One `DROP`/`CREATE TABLE` block per table, in dependency order
    pub table_ddl: Vec<String>,
    pub table_inserts: Vec<String>,
    pub indexes: Vec<String>,
    /// Whether the views section (and its marker) is written
    pub views_included: bool,
    pub view_ddl: Vec<String>,
    pub view_inserts: Vec<String>,
    /// Failures recorded under `FailurePolicy::Annotate`
    pub failures: Vec<String>,
}

impl DumpScript {
    pub fn new(source: &SourceInfo) -> Self {
        Self {
            header: vec![
                format!("Source: {} {}", source.product_name, source.product_version),
                format!("Driver: {} {}", source.driver_name, source.driver_version),
            ],
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Flatten into script text. Every statement block is followed by a
    /// `separator` line.
    pub fn render(&self, separator: &str) -> String {
        let mut out = String::new();

        for line in self.header.iter().chain(&self.diagnostics) {
            push_comment(&mut out, line);
        }
        push_line(&mut out, separator);

        for block in self
            .table_ddl
            .iter()
            .chain(&self.table_inserts)
            .chain(&self.indexes)
        {
            push_line(&mut out, block);
            push_line(&mut out, separator);
        }

        if self.views_included {
            push_comment(&mut out, "Views:");
            for block in self.view_ddl.iter().chain(&self.view_inserts) {
                push_line(&mut out, block);
                push_line(&mut out, separator);
            }
        }

        if !self.failures.is_empty() {
            push_comment(
                &mut out,
                &format!("Dump incomplete: {} failure(s)", self.failures.len()),
            );
            for failure in &self.failures {
                push_comment(&mut out, failure);
            }
        }

        out
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Single-line SQL comment; embedded line breaks would end the comment early
fn push_comment(out: &mut String, text: &str) {
    out.push_str("-- ");
    out.push_str(&text.replace(['\r', '\n'], " "));
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn source() -> SourceInfo {
        SourceInfo {
            product_name: "SQLite".into(),
            product_version: "3.45.1".into(),
            driver_name: "dbdump-driver-sqlite".into(),
            driver_version: "0.1.0".into(),
        }
    }

    #[test]
    fn test_empty_dump_has_header_and_views_marker() {
        let script = DumpScript {
            views_included: true,
            ..DumpScript::new(&source())
        };
        assert_eq!(
            script.render("---"),
            indoc! {"
                -- Source: SQLite 3.45.1
                -- Driver: dbdump-driver-sqlite 0.1.0
                ---
                -- Views:
            "}
        );
    }

    #[test]
    fn test_sections_in_order_with_separators() {
        let script = DumpScript {
            diagnostics: vec!["foreign key cycle: \"a\" placed before \"b\"".into()],
            table_ddl: vec!["CREATE TABLE a;".into()],
            table_inserts: vec!["INSERT INTO a VALUES(1);".into()],
            indexes: vec!["CREATE INDEX i ON a (x);".into()],
            ..DumpScript::new(&source())
        };
        assert_eq!(
            script.render("-- //"),
            indoc! {r#"
                -- Source: SQLite 3.45.1
                -- Driver: dbdump-driver-sqlite 0.1.0
                -- foreign key cycle: "a" placed before "b"
                -- //
                CREATE TABLE a;
                -- //
                INSERT INTO a VALUES(1);
                -- //
                CREATE INDEX i ON a (x);
                -- //
            "#}
        );
    }

    #[test]
    fn test_failure_summary_is_single_line_comments() {
        let script = DumpScript {
            failures: vec!["table \"t\": inserts failed: line one\nline two".into()],
            ..DumpScript::new(&source())
        };
        let text = script.render("---");
        assert!(!script.is_complete());
        assert!(text.ends_with(indoc! {r#"
            -- Dump incomplete: 1 failure(s)
            -- table "t": inserts failed: line one line two
        "#}));
    }
}
