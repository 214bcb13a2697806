//! Migration entity and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Whether a migration is currently applied to the database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Not applied (the default for every new migration)
    #[default]
    Inactive,
    /// Applied and not yet rolled back
    Active,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStatus::Inactive => write!(f, "inactive"),
            MigrationStatus::Active => write!(f, "active"),
        }
    }
}

/// Which script of a migration to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply the migration
    Up,
    /// Reverse the migration
    Down,
}

impl Direction {
    /// The status a migration has after successfully running in this direction
    pub fn resulting_status(self) -> MigrationStatus {
        match self {
            Direction::Up => MigrationStatus::Active,
            Direction::Down => MigrationStatus::Inactive,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A single versioned, reversible database change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Unique, non-zero id; also the application order
    pub id: u64,

    /// Human-readable name
    pub name: String,

    /// Applied state as last seen by the migrator
    #[serde(default)]
    pub status: MigrationStatus,

    /// SQL that applies the change
    #[serde(default)]
    pub up: String,

    /// SQL that reverses the change
    #[serde(default)]
    pub down: String,

    /// Where the migration came from (file paths), for diagnostics only
    #[serde(default)]
    pub source: String,
}

impl Migration {
    /// Create an inactive migration with both scripts
    pub fn new(
        id: u64,
        name: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            status: MigrationStatus::Inactive,
            up: up.into(),
            down: down.into(),
            source: String::new(),
        }
    }

    /// Set the diagnostic source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Returns the script for the given direction
    pub fn script(&self, direction: Direction) -> &str {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    pub(crate) fn script_mut(&mut self, direction: Direction) -> &mut String {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }

    /// Returns true if the migration is currently applied
    pub fn is_active(&self) -> bool {
        self.status == MigrationStatus::Active
    }

    /// Checks that the migration is properly formed and named.
    ///
    /// SQL is not inspected; broken scripts only surface when they run.
    pub fn validate(&self) -> Result<(), InvalidMigration> {
        if self.id == 0 {
            return Err(InvalidMigration::new(self, "id can't be zero"));
        }
        if self.name.is_empty() {
            return Err(InvalidMigration::new(self, "name can't be empty"));
        }
        Ok(())
    }
}

/// Why a migration failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid migration id:{id}, name:'{name}': {reason}")]
pub struct InvalidMigration {
    pub id: u64,
    pub name: String,
    pub reason: String,
}

impl InvalidMigration {
    fn new(migration: &Migration, reason: &str) -> Self {
        Self {
            id: migration.id,
            name: migration.name.clone(),
            reason: reason.to_string(),
        }
    }
}
