use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::entities::value::Scalar;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Which side of the reconciliation a load problem was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "spreadsheet"),
            Side::Target => write!(f, "table"),
        }
    }
}

/// Raised before any preview is built. Fatal to the current attempt only:
/// the caller may pick another file, sheet or table and retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceLoadError {
    #[error("key column '{column}' is missing from the {side}")]
    MissingKeyColumn { side: Side, column: String },

    #[error("column '{column}' is missing from the {side}")]
    MissingColumn { side: Side, column: String },

    #[error("sheet '{0}' has no header row")]
    EmptySheet(String),

    #[error("sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("sheet '{sheet}' repeats header '{header}'")]
    DuplicateHeader { sheet: String, header: String },

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("cannot read {path}: {detail}")]
    Unreadable { path: PathBuf, detail: String },
}

/// Classification of a failed statement, derived from the database error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementFailure {
    Constraint,
    TypeMismatch,
    Connection,
    Other,
}

impl fmt::Display for StatementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementFailure::Constraint => write!(f, "constraint violation"),
            StatementFailure::TypeMismatch => write!(f, "type mismatch"),
            StatementFailure::Connection => write!(f, "connection failure"),
            StatementFailure::Other => write!(f, "database error"),
        }
    }
}

/// Transaction-scoped failure. Whenever one of these is reported the whole
/// run has been rolled back.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncExecutionError {
    #[error("record {key}: {kind}: {detail}")]
    Statement {
        key: Scalar,
        kind: StatementFailure,
        detail: String,
    },

    #[error("record {key}: update matched no rows")]
    ZeroRowsAffected { key: Scalar },

    #[error("cancelled after {applied} of {total} statements")]
    Cancelled { applied: usize, total: usize },

    #[error("commit failed: {0}")]
    Commit(String),
}

/// Error type covering every failure the engine and its adapters report.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    SourceLoad(#[from] SourceLoadError),

    #[error("invalid column mapping: {0}")]
    InvalidMapping(String),

    /// Raised when execution is requested without a current preview.
    #[error("no current preview; generate a preview before executing")]
    StalePlan,

    #[error("sync rolled back: {0}")]
    Execution(#[from] SyncExecutionError),

    #[error("database error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when a background job is requested while another one is running.
    #[error("another operation is still running")]
    Busy,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl SyncError {
    pub fn store(err: anyhow::Error) -> Self {
        SyncError::Store(format!("{err:#}"))
    }
}
