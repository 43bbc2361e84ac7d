//! Structural pipeline errors.
//!
//! Anything here means the fixed-width contract between stages was broken;
//! none of it is recovered locally.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("branch '{branch}' returned {actual} rows, expected {expected}")]
    RowCountMismatch {
        branch: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' is missing from the input table")]
    MissingColumn(String),

    #[error("schema mismatch: expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("branch '{branch}' changed width: fitted {expected} columns, now {actual}")]
    WidthChanged {
        branch: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("column '{column}' has {actual} values, table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("{labels} labels for {rows} price rows")]
    LabelLengthMismatch { labels: usize, rows: usize },

    #[error("duplicate branch name '{0}'")]
    DuplicateBranch(String),

    #[error("column '{column}' is undefined at {date} after the leading rows were aligned")]
    UndefinedValue { column: String, date: NaiveDate },

    #[error("{0} used before fit")]
    NotFitted(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
