use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};

use crate::domain::entities::value::ColumnType;
use crate::usecase::ports::target::{quote_ident, TableColumn};

/// Opens an existing database for writing. A missing file is an error.
pub fn open_connection(db_path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(db_path, flags)
        .with_context(|| format!("failed to open db: {}", db_path.display()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign key enforcement")?;
    Ok(conn)
}

pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name
             FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name ASC",
        )
        .context("failed to prepare table list query")?;

    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("failed to query tables")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect tables")?;

    Ok(tables)
}

/// Columns of `table` in declaration order. Empty when the table does not exist.
pub fn describe_table(conn: &Connection, table: &str) -> Result<Vec<TableColumn>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
        .with_context(|| format!("failed to prepare column query for table: {table}"))?;

    let columns = stmt
        .query_map([], |row| {
            let declared_type: String = row.get(2)?;
            let not_null: i64 = row.get(3)?;
            let default_value: Option<String> = row.get(4)?;
            let primary_key: i64 = row.get(5)?;
            Ok(TableColumn {
                name: row.get(1)?,
                column_type: ColumnType::from_declared(&declared_type),
                declared_type,
                not_null: not_null != 0,
                has_default: default_value.is_some(),
                primary_key: primary_key != 0,
            })
        })
        .with_context(|| format!("failed to query columns for table: {table}"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect columns")?;

    Ok(columns)
}

/// Primary key columns of `table`, in key order.
pub fn primary_key(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk ASC")
        .with_context(|| format!("failed to prepare primary key query for table: {table}"))?;

    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))
        .with_context(|| format!("failed to query primary key for table: {table}"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect primary key columns")?;

    Ok(columns)
}
