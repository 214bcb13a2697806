//! Common test utilities shared across test files.
//!
//! This module provides a scripted in-memory database and a recording logger.
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use updown_core::{Database, DbError, Logger, SqlValue, Transaction, MIGRATIONS_TABLE};

// ===== Recording Logger =====

/// A logger that keeps every message for later assertions
#[derive(Default)]
pub struct RecordingLogger {
    pub lines: Mutex<Vec<String>>,
    pub fatals: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn fatals(&self) -> Vec<String> {
        self.fatals.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl Logger for RecordingLogger {
    fn print(&self, message: fmt::Arguments<'_>) {
        self.lines.lock().unwrap().push(message.to_string());
    }

    fn fatal(&self, message: fmt::Arguments<'_>) {
        self.fatals.lock().unwrap().push(message.to_string());
    }
}

// ===== Scripted Database =====

/// Observable state of a [`MockDatabase`]
#[derive(Debug, Default)]
pub struct MockState {
    /// Every statement passed to `execute`, in order
    pub executed: Vec<String>,
    /// Migration ids recorded by committed transactions
    pub applied: BTreeSet<i64>,
    pub table_exists: bool,

    /// Statements containing this text fail
    pub fail_on: Option<String>,
    pub fail_begin: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,

    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

/// An in-memory stand-in for a real database.
///
/// Table-existence checks are recognized by their text parameter and
/// status lookups by their integer parameter, so any dialect works against it.
#[derive(Clone, Default)]
pub struct MockDatabase {
    pub state: Arc<Mutex<MockState>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database whose metadata table already records `ids`
    pub fn with_applied(ids: &[i64]) -> Self {
        let db = Self::new();
        {
            let mut state = db.state.lock().unwrap();
            state.table_exists = true;
            state.applied.extend(ids.iter().copied());
        }
        db
    }

    pub fn fail_on(&self, needle: &str) {
        self.state.lock().unwrap().fail_on = Some(needle.to_string());
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn applied(&self) -> Vec<i64> {
        self.state.lock().unwrap().applied.iter().copied().collect()
    }

    fn record(state: &mut MockState, sql: &str) -> Result<(), DbError> {
        state.executed.push(sql.to_string());
        match &state.fail_on {
            Some(needle) if sql.contains(needle.as_str()) => {
                Err(DbError::Backend(format!("statement failed: {}", sql.trim())))
            }
            _ => Ok(()),
        }
    }
}

impl Database for MockDatabase {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, DbError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_begin {
            return Err(DbError::Backend("cannot begin".to_string()));
        }
        state.begins += 1;
        Ok(Box::new(MockTransaction {
            state: self.state.clone(),
            inserted: Vec::new(),
            deleted: Vec::new(),
        }))
    }

    fn execute(&self, sql: &str, _params: &[SqlValue]) -> Result<Option<u64>, DbError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, sql)?;
        if sql.starts_with("CREATE TABLE") && sql.contains(MIGRATIONS_TABLE) {
            state.table_exists = true;
        }
        Ok(Some(0))
    }

    fn query_row(&self, _sql: &str, params: &[SqlValue]) -> Result<Option<SqlValue>, DbError> {
        let state = self.state.lock().unwrap();
        match params.first() {
            Some(SqlValue::Text(name)) => {
                Ok((state.table_exists && name == MIGRATIONS_TABLE).then(|| SqlValue::from(name.as_str())))
            }
            Some(SqlValue::Integer(id)) => {
                if !state.table_exists {
                    return Err(DbError::Backend("no such table".to_string()));
                }
                Ok(state.applied.contains(id).then_some(SqlValue::Integer(*id)))
            }
            _ => Ok(None),
        }
    }
}

struct MockTransaction {
    state: Arc<Mutex<MockState>>,
    inserted: Vec<i64>,
    deleted: Vec<i64>,
}

impl Transaction for MockTransaction {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<Option<u64>, DbError> {
        let mut state = self.state.lock().unwrap();
        MockDatabase::record(&mut state, sql)?;

        if sql.contains(MIGRATIONS_TABLE) {
            let id = params.first().and_then(SqlValue::as_i64);
            if let Some(id) = id {
                if sql.starts_with("INSERT") {
                    self.inserted.push(id);
                } else if sql.starts_with("DELETE") {
                    self.deleted.push(id);
                }
            }
        }
        Ok(Some(1))
    }

    fn commit(self: Box<Self>) -> Result<(), DbError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(DbError::Backend("commit failed".to_string()));
        }
        state.commits += 1;
        state.applied.extend(self.inserted.iter().copied());
        for id in &self.deleted {
            state.applied.remove(id);
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), DbError> {
        let mut state = self.state.lock().unwrap();
        state.rollbacks += 1;
        if state.fail_rollback {
            return Err(DbError::Backend("rollback failed".to_string()));
        }
        Ok(())
    }
}
