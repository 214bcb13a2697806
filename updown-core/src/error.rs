//! Error types for migration operations

use crate::database::DbError;
use crate::migration::{Direction, InvalidMigration};
use thiserror::Error;

/// Errors that can occur while loading or running migrations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A migration failed structural validation
    #[error(transparent)]
    InvalidMigration(#[from] InvalidMigration),

    /// Migration files on disk could not be combined into a valid migration
    #[error("Invalid pair of migration files: {files}")]
    InvalidMigrationPair {
        /// Space separated paths of the offending files
        files: String,
    },

    /// Two migrations share the same id
    #[error("Duplicate migration id: {0}")]
    DuplicateMigration(u64),

    /// The requested direction has no script to run
    #[error("Invalid migration type: migration {id} has no {direction} script")]
    InvalidMigrationType { id: u64, direction: Direction },

    /// The highest existing id leaves no room for another migration
    #[error("No migration id available after {0}")]
    MigrationIdExhausted(u64),

    /// No migration with the given id is known to the migrator
    #[error("Migration not found: {0}")]
    MigrationNotFound(u64),

    /// Error reported by the database capability
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Invalid glob pattern built from the migrations path
    #[error("Invalid migrations path pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// IO error while reading or writing migration files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Returns true if this error came from the database rather than the migration set
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, MigrateError>;
