//! Dump configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::DumpError;

/// What to do when a single table or view cannot be dumped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failure and return it
    #[default]
    Abort,
    /// Leave the failed object's output out, keep going, and append a
    /// summary of every failure to the script
    Annotate,
}

/// Options for a dump run
///
/// Loadable from TOML; every key is optional:
///
/// ```toml
/// include_data = true
/// exclude_tables = ["audit_log"]
/// failure_policy = "annotate"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// Whether to emit INSERT statements for tables and views
    pub include_data: bool,
    /// Whether to emit CREATE INDEX statements
    pub include_indexes: bool,
    /// Whether to snapshot views into tables
    pub include_views: bool,
    /// Tables to include (empty = all tables)
    pub include_tables: Vec<String>,
    /// Tables to exclude
    pub exclude_tables: Vec<String>,
    /// Line written after each statement block. Must be a SQL comment for
    /// the script to stay executable.
    pub separator: String,
    /// Prefix for the tables views are snapshotted into
    pub view_prefix: String,
    pub failure_policy: FailurePolicy,
    /// Schema name (for databases that support schemas)
    pub schema: Option<String>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            include_data: true,
            include_indexes: true,
            include_views: true,
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            separator: "---".to_string(),
            view_prefix: "view_".to_string(),
            failure_policy: FailurePolicy::Abort,
            schema: None,
        }
    }
}

impl DumpOptions {
    pub fn schema_only() -> Self {
        Self {
            include_data: false,
            ..Default::default()
        }
    }

    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.include_tables = tables;
        self
    }

    pub fn excluding(mut self, tables: Vec<String>) -> Self {
        self.exclude_tables = tables;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn without_views(mut self) -> Self {
        self.include_views = false;
        self
    }

    /// Parse options from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, DumpError> {
        let options: DumpOptions =
            toml::from_str(text).map_err(|e| DumpError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DumpError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading dump options");
        let text = std::fs::read_to_string(path).map_err(|e| {
            DumpError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), DumpError> {
        if self.separator.trim().is_empty() {
            return Err(DumpError::Config("separator must not be empty".into()));
        }
        if self.separator.contains('\n') {
            return Err(DumpError::Config("separator must be a single line".into()));
        }
        if self.include_views && self.view_prefix.is_empty() {
            return Err(DumpError::Config(
                "view_prefix must not be empty when views are dumped".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn should_include_table(&self, table_name: &str) -> bool {
        if !self.include_tables.is_empty()
            && !self.include_tables.iter().any(|t| t == table_name)
        {
            return false;
        }
        !self.exclude_tables.iter().any(|t| t == table_name)
    }
}
