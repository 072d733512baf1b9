use std::path::Path;

use anyhow::Context;
use rusqlite::Connection;

use crate::domain::entities::value::Scalar;
use crate::error::{Result, SyncError};
use crate::infra::sqlite::queries::{fetch_rows, run_statement, store_failure};
use crate::infra::sqlite::schema::{describe_table, list_tables, open_connection};
use crate::usecase::ports::target::{
    Statement, StoreFailure, TableColumn, TargetStore, TargetTransaction,
};

/// Target database backed by one SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = open_connection(db_path).map_err(SyncError::store)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl TargetStore for SqliteStore {
    fn list_tables(&self) -> Result<Vec<String>> {
        list_tables(&self.conn).map_err(SyncError::store)
    }

    fn describe_table(&self, table: &str) -> Result<Vec<TableColumn>> {
        describe_table(&self.conn, table).map_err(SyncError::store)
    }

    fn fetch_rows(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<Scalar>>> {
        fetch_rows(&self.conn, table, columns).map_err(SyncError::store)
    }

    fn begin(&mut self) -> Result<Box<dyn TargetTransaction + '_>> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start sync transaction")
            .map_err(SyncError::store)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

/// Open write transaction. rusqlite rolls it back on drop.
pub struct SqliteTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl TargetTransaction for SqliteTransaction<'_> {
    fn execute(&mut self, statement: &Statement) -> std::result::Result<usize, StoreFailure> {
        run_statement(&self.tx, statement)
    }

    fn commit(self: Box<Self>) -> std::result::Result<(), StoreFailure> {
        self.tx.commit().map_err(store_failure)
    }

    fn rollback(self: Box<Self>) -> std::result::Result<(), StoreFailure> {
        self.tx.rollback().map_err(store_failure)
    }
}
