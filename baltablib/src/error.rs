//! Error types for baltablib

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, augmenting or writing a table
#[derive(Error, Debug)]
pub enum BalanceError {
    /// Grouping selector does not resolve to exactly one present column
    #[error("invalid grouping: {0}")]
    InvalidGrouping(String),

    /// A grouping or categorical column has too many distinct levels
    #[error("column '{column}' has {levels} distinct levels (at most {ceiling} allowed)")]
    TooManyLevels {
        column: String,
        levels: usize,
        ceiling: usize,
    },

    /// Output keyword, extension or backend/format pairing is not supported
    #[error("unsupported output: {0}")]
    UnsupportedOutput(String),

    /// Extra rows/columns/headers do not fit the table body
    #[error("augmentation shape mismatch: {0}")]
    AugmentationShape(String),

    /// Difference in means is undefined for this column.
    ///
    /// This is a soft error: the table builder recovers by leaving the
    /// difference cells blank.
    #[error("difference in means is undefined for column '{column}': {reason}")]
    UndefinedDifference { column: String, reason: String },

    /// Dataset columns are malformed (unequal lengths, duplicate names, ...)
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// Numeric format directive could not be parsed
    #[error("invalid format string '{0}'")]
    InvalidFormat(String),

    /// Settings file could not be parsed
    #[error("failed to parse settings '{path}': {message}")]
    Config { path: PathBuf, message: String },

    /// CSV input could not be read
    #[error("CSV error at row {row}: {message}")]
    Csv { row: u64, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BalanceError {
    /// Whether the error is recovered locally (blank cell) rather than
    /// aborting the whole call.
    pub fn is_soft(&self) -> bool {
        matches!(self, BalanceError::UndefinedDifference { .. })
    }
}

impl From<csv::Error> for BalanceError {
    fn from(err: csv::Error) -> Self {
        let row = err.position().map(|p| p.record()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(e) => BalanceError::Io(e),
            kind => BalanceError::Csv {
                row,
                message: format!("{:?}", kind),
            },
        }
    }
}
