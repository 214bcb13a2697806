//! Database capability consumed by the migrator
//!
//! The migrator never talks to a driver directly. It needs three things from
//! a connection: open a transaction, execute a statement with positional
//! parameters, and fetch the first column of at most one row. Backends
//! implement [`Database`] and [`Transaction`]; the crate ships a SQLite
//! backend behind the `sqlite` feature.

use std::fmt;
use thiserror::Error;

/// Errors reported by a database backend
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite driver error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A connection lock was poisoned by a panicking thread
    #[error("Connection lock poisoned")]
    Poisoned,

    /// Error from any other backend
    #[error("{0}")]
    Backend(String),
}

/// A positional statement parameter or a fetched column value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
}

impl SqlValue {
    /// Returns the integer value, if this is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text value, if this is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<u64> for SqlValue {
    /// Migration ids are stored in signed 64-bit columns; values above
    /// `i64::MAX` wrap the same way a driver's bit cast would.
    fn from(value: u64) -> Self {
        SqlValue::Integer(value as i64)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(v) => write!(f, "{v}"),
            SqlValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// A database connection or pool the migrator can run against.
///
/// Implementations must be safe to share between threads; the migrator
/// itself only ever uses one transaction at a time.
pub trait Database: Send + Sync {
    /// Open a new transaction
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, DbError>;

    /// Execute a statement outside of any transaction.
    ///
    /// Returns the number of affected rows when the backend reports one.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Option<u64>, DbError>;

    /// Fetch the first column of the first row.
    ///
    /// `Ok(None)` means the query produced no rows, which is not an error.
    fn query_row(&self, sql: &str, params: &[SqlValue]) -> Result<Option<SqlValue>, DbError>;
}

/// An open transaction.
///
/// Dropping a transaction without calling [`commit`](Transaction::commit)
/// must leave the database as it was before [`Database::begin`].
pub trait Transaction {
    /// Execute a statement inside the transaction
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<Option<u64>, DbError>;

    /// Make all statements executed in this transaction durable
    fn commit(self: Box<Self>) -> Result<(), DbError>;

    /// Discard all statements executed in this transaction
    fn rollback(self: Box<Self>) -> Result<(), DbError>;
}
