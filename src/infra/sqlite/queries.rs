use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection, ErrorCode};

use crate::domain::entities::value::Scalar;
use crate::error::StatementFailure;
use crate::infra::sqlite::value::scalar_from_sql;
use crate::usecase::ports::target::{quote_ident, Statement, StoreFailure};

/// Reads `columns` from every row of `table`. Rows come back in the order
/// SQLite scans them.
pub fn fetch_rows(conn: &Connection, table: &str, columns: &[&str]) -> Result<Vec<Vec<Scalar>>> {
    if columns.is_empty() {
        anyhow::bail!("at least one column is required")
    }

    let columns_sql: Vec<String> = columns.iter().map(|column| quote_ident(column)).collect();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM {}",
            columns_sql.join(", "),
            quote_ident(table)
        ))
        .with_context(|| format!("failed to prepare row query for table: {table}"))?;

    let width = columns.len();
    let rows = stmt
        .query_map([], |row| {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(scalar_from_sql(row.get_ref(idx)?));
            }
            Ok(values)
        })
        .with_context(|| format!("failed to query rows from table: {table}"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to read table row")?;

    Ok(rows)
}

/// Runs one bound statement and reports the affected row count.
pub fn run_statement(
    conn: &Connection,
    statement: &Statement,
) -> std::result::Result<usize, StoreFailure> {
    conn.prepare_cached(&statement.sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(statement.params.iter())))
        .map_err(store_failure)
}

pub fn store_failure(err: rusqlite::Error) -> StoreFailure {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => StatementFailure::Constraint,
            ErrorCode::TypeMismatch => StatementFailure::TypeMismatch,
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure => StatementFailure::Connection,
            _ => StatementFailure::Other,
        },
        _ => StatementFailure::Other,
    };
    StoreFailure {
        kind,
        detail: err.to_string(),
    }
}
