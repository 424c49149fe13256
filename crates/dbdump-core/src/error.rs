//! Error types for data source operations

use thiserror::Error;

/// Error reported by a data source or its driver
#[derive(Error, Debug)]
pub enum DbDumpError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for data source operations
pub type Result<T> = std::result::Result<T, DbDumpError>;
