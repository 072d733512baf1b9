use crate::domain::entities::change::ChangeKind;
use crate::domain::entities::value::{ColumnType, Scalar};
use crate::error::{Result, StatementFailure};

/// Column description as reported by the target database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub declared_type: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub has_default: bool,
    pub primary_key: bool,
}

/// A parameterized INSERT or UPDATE for one change record. Values are
/// always bound, never interpolated into `sql`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: ChangeKind,
    pub key: Scalar,
    pub sql: String,
    pub params: Vec<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub kind: StatementFailure,
    pub detail: String,
}

/// Relational table reachable over an existing connection. Only
/// [`TargetStore::begin`] hands out write access.
pub trait TargetStore {
    fn list_tables(&self) -> Result<Vec<String>>;
    fn describe_table(&self, table: &str) -> Result<Vec<TableColumn>>;
    /// Returns the requested columns of every row, in load order, exactly as
    /// stored.
    fn fetch_rows(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<Scalar>>>;
    fn begin(&mut self) -> Result<Box<dyn TargetTransaction + '_>>;
}

/// Scoped write access. Dropping a transaction without committing rolls it back.
pub trait TargetTransaction {
    /// Runs one statement and returns the number of affected rows.
    fn execute(&mut self, statement: &Statement) -> std::result::Result<usize, StoreFailure>;
    fn commit(self: Box<Self>) -> std::result::Result<(), StoreFailure>;
    fn rollback(self: Box<Self>) -> std::result::Result<(), StoreFailure>;
}

/// Double-quotes an identifier for use in generated SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
