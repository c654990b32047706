// ❌ Error taxonomy - fatal conditions only
// Non-fatal conditions (degraded input, coerced values) live in diagnostics.rs

use crate::ingest::SourceKind;

/// Fatal run errors. Any of these aborts the run before publishing.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// A required run parameter is unset or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A mandatory source table is absent from the batch
    #[error("Missing source: no {0} extract found in batch")]
    MissingSource(SourceKind),

    /// No candidate date column could be resolved for the fact table
    #[error("No date column found in sales table (columns: {columns:?})")]
    MissingDateColumn { columns: Vec<String> },

    /// A dimension handed to the fact join carries a duplicate natural key
    #[error("Dimension '{dimension}' has duplicate natural key '{key}'")]
    DuplicateNaturalKey { dimension: String, key: String },

    /// Fact assembly changed the row count of the sales table
    #[error("Fact table has {actual} rows, expected {expected}")]
    RowCountMismatch { expected: usize, actual: usize },

    #[error("Encoding error in {path}: {message}")]
    Encoding { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;

impl EtlError {
    /// True for the configuration class of errors (raised before any transform runs)
    pub fn is_configuration(&self) -> bool {
        matches!(self, EtlError::Configuration(_))
    }
}
