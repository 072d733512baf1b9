use std::fmt;

use thiserror::Error;

use crate::domain::entities::row::SourceRow;
use crate::domain::entities::value::{ColumnType, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    New,
    Update,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::New => write!(f, "ADD"),
            ChangeKind::Update => write!(f, "UPDATE"),
        }
    }
}

/// A source value that cannot be stored in its target column. Records
/// carrying one are shown in the preview but never executed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("column '{column}': '{value}' is not a valid {expected} value")]
pub struct TypeCoercionError {
    pub column: String,
    pub value: Scalar,
    pub expected: ColumnType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChange {
    pub column: String,
    pub old: Scalar,
    pub new: Scalar,
}

/// One row's reconciliation outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// For updates, the key as stored in the table; for inserts, the
    /// spreadsheet key coerced to the key column's type.
    pub key: Scalar,
    pub kind: ChangeKind,
    pub changes: Vec<ColumnChange>,
    pub source_row: SourceRow,
    pub issues: Vec<TypeCoercionError>,
}

impl ChangeRecord {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn highlight(&self) -> Highlight {
        match (self.is_valid(), self.kind) {
            (false, _) => Highlight::Invalid,
            (true, ChangeKind::New) => Highlight::Added,
            (true, ChangeKind::Update) => Highlight::Modified,
        }
    }
}

/// Preview colour of a record. Rows absent from the plan are unchanged and
/// implicitly white.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Added,
    Modified,
    Invalid,
}

impl Highlight {
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Highlight::Added => (200, 255, 200),
            Highlight::Modified => (255, 220, 180),
            Highlight::Invalid => (255, 200, 200),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Highlight::Added => "green",
            Highlight::Modified => "orange",
            Highlight::Invalid => "error",
        }
    }
}
