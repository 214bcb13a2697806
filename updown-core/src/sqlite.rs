//! SQLite backend for the [`Database`] capability
//!
//! The connection is guarded by a mutex; an open [`Transaction`] holds the
//! lock until it is committed, rolled back or dropped.

use crate::database::{Database, DbError, SqlValue, Transaction};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// A SQLite database the migrator can run against
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Opens or creates a database file, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbError::Backend(format!(
                        "Failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection
    pub fn from_connection(conn: Connection) -> Result<Self, DbError> {
        // Enable foreign keys by default
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs a closure against the underlying connection.
    ///
    /// Blocks while a migration transaction is open.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }
}

impl Database for SqliteDatabase {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, DbError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN")?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Option<u64>, DbError> {
        let conn = self.lock()?;
        run(&conn, sql, params)
    }

    fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<SqlValue>, DbError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(sql, params_from_iter(params.iter().map(to_sqlite)), |row| {
                row.get::<_, Value>(0)
            })
            .optional()?;
        Ok(value.map(from_sqlite))
    }
}

struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Transaction for SqliteTransaction<'_> {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<Option<u64>, DbError> {
        run(&self.conn, sql, params)
    }

    fn commit(mut self: Box<Self>) -> Result<(), DbError> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<(), DbError> {
        self.conn.execute_batch("ROLLBACK")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

/// Parameterless statements go through `execute_batch` so a whole
/// multi-statement script can run as one command.
fn run(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<Option<u64>, DbError> {
    if params.is_empty() {
        conn.execute_batch(sql)?;
        return Ok(None);
    }
    let affected = conn.execute(sql, params_from_iter(params.iter().map(to_sqlite)))?;
    Ok(Some(affected as u64))
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
    }
}

fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(v),
        Value::Real(v) => SqlValue::Text(v.to_string()),
        Value::Text(v) => SqlValue::Text(v),
        Value::Blob(v) => SqlValue::Text(String::from_utf8_lossy(&v).into_owned()),
    }
}
