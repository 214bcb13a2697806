//! The migration state machine
//!
//! A [`Migrator`] owns the migration collection and decides what to run.
//! The metadata table in the target database is the source of truth; the
//! in-memory status of each migration is refreshed from it before every
//! apply or rollback decision.
//!
//! Each migration runs in its own transaction together with its bookkeeping
//! row, so a migration is either fully applied or not applied at all. A run
//! that fails partway keeps the migrations committed before the failure.

use crate::database::{Database, DbError, SqlValue, Transaction};
use crate::dialect::{Dialect, MIGRATIONS_TABLE};
use crate::error::{MigrateError, Result};
use crate::loader::{index_migrations, migrations_from_path};
use crate::logger::{LogLogger, Logger};
use crate::migration::{Direction, Migration, MigrationStatus};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Applies and rolls back migrations against one database
pub struct Migrator {
    db: Arc<dyn Database>,
    dialect: Box<dyn Dialect>,
    migrations: BTreeMap<u64, Migration>,
    logger: Arc<dyn Logger>,
}

impl Migrator {
    /// Creates a migrator for the given in-memory migrations.
    ///
    /// Migrations are validated and reset to inactive; nothing touches the
    /// database until [`migrate`](Self::migrate) or a rollback is called.
    pub fn with_migrations<I>(
        db: Arc<dyn Database>,
        dialect: Box<dyn Dialect>,
        migrations: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Migration>,
    {
        Ok(Self {
            db,
            dialect,
            migrations: index_migrations(migrations)?,
            logger: Arc::new(LogLogger),
        })
    }

    /// Creates a migrator from the migration files in `migrations_path`
    pub fn from_path(
        db: Arc<dyn Database>,
        dialect: Box<dyn Dialect>,
        migrations_path: impl AsRef<Path>,
    ) -> Result<Self> {
        Self::from_path_with_logger(db, dialect, migrations_path, Arc::new(LogLogger))
    }

    /// Like [`from_path`](Self::from_path), reporting loading progress to `logger`
    pub fn from_path_with_logger(
        db: Arc<dyn Database>,
        dialect: Box<dyn Dialect>,
        migrations_path: impl AsRef<Path>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        let migrations = migrations_from_path(migrations_path.as_ref(), logger.as_ref())?;
        Ok(Self::with_migrations(db, dialect, migrations)?.with_logger(logger))
    }

    /// Replaces the logger
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// The dialect this migrator generates bookkeeping SQL for
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Looks up a migration by id
    pub fn migration(&self, id: u64) -> Option<&Migration> {
        self.migrations.get(&id)
    }

    /// Migrations in ascending id order, optionally only those with `status`.
    ///
    /// Status reflects the last refresh; call
    /// [`refresh_statuses`](Self::refresh_statuses) first for a fresh view.
    pub fn migrations(&self, status: Option<MigrationStatus>) -> Vec<&Migration> {
        self.migrations
            .values()
            .filter(|m| status.map_or(true, |s| m.status == s))
            .collect()
    }

    /// Returns true if the metadata table exists
    pub fn migration_table_exists(&self) -> Result<bool> {
        let params = [SqlValue::from(MIGRATIONS_TABLE)];
        match self
            .db
            .query_row(&self.dialect.select_migration_table_sql(), &params)
        {
            Ok(Some(_)) => {
                self.logger.print(format_args!("Migrations table found"));
                Ok(true)
            }
            Ok(None) => {
                self.logger.print(format_args!("Migrations table not found"));
                Ok(false)
            }
            Err(e) => {
                self.logger
                    .print(format_args!("Error checking for migration table: {}", e));
                Err(e.into())
            }
        }
    }

    /// Creates the metadata table.
    ///
    /// Failure is reported to the logger at fatal level before it is returned.
    pub fn create_migrations_table(&self) -> Result<()> {
        if let Err(e) = self
            .db
            .execute(&self.dialect.create_migration_table_sql(), &[])
        {
            self.logger
                .fatal(format_args!("Error creating migrations table: {}", e));
            return Err(e.into());
        }

        self.logger
            .print(format_args!("Created migrations table: {}", MIGRATIONS_TABLE));
        Ok(())
    }

    /// Marks every migration recorded in the metadata table as active.
    ///
    /// Migrations without a row keep their current status.
    pub fn refresh_statuses(&mut self) -> Result<()> {
        let sql = self.dialect.get_migration_sql();

        for migration in self.migrations.values_mut() {
            match self.db.query_row(&sql, &[SqlValue::from(migration.id)]) {
                Ok(Some(_)) => migration.status = MigrationStatus::Active,
                Ok(None) => {}
                Err(e) => {
                    self.logger.print(format_args!(
                        "Error getting migration status for {}: {}",
                        migration.name, e
                    ));
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    /// Applies every inactive migration in ascending id order.
    ///
    /// Creates the metadata table first if needed. Stops at the first failure.
    /// Returns the number of migrations applied.
    pub fn migrate(&mut self) -> Result<usize> {
        if !self.migration_table_exists()? {
            self.create_migrations_table()?;
        }
        self.refresh_statuses()?;

        let pending: Vec<u64> = self
            .migrations(Some(MigrationStatus::Inactive))
            .iter()
            .map(|m| m.id)
            .collect();

        for id in &pending {
            self.apply_migration(*id, Direction::Up)?;
        }

        Ok(pending.len())
    }

    /// Rolls back the most recently applied migration
    pub fn rollback(&mut self) -> Result<usize> {
        self.rollback_n(1)
    }

    /// Rolls back the `n` active migrations with the highest ids, highest first.
    ///
    /// Asking for more than are active rolls back all of them. Stops at the
    /// first failure. Returns the number of migrations rolled back.
    pub fn rollback_n(&mut self, n: usize) -> Result<usize> {
        self.refresh_statuses()?;

        let active: Vec<u64> = self
            .migrations(Some(MigrationStatus::Active))
            .iter()
            .map(|m| m.id)
            .collect();
        if active.is_empty() {
            return Ok(0);
        }

        let first = active.len().saturating_sub(n);
        let targets = &active[first..];

        for id in targets.iter().rev() {
            self.apply_migration(*id, Direction::Down)?;
        }

        Ok(targets.len())
    }

    /// Rolls back every active migration, highest id first
    pub fn rollback_all(&mut self) -> Result<usize> {
        self.refresh_statuses()?;
        let count = self.migrations(Some(MigrationStatus::Active)).len();
        self.rollback_n(count)
    }

    /// Runs one migration in one direction inside a single transaction.
    ///
    /// On success the bookkeeping row is inserted (up) or deleted (down) in
    /// the same transaction and the in-memory status is updated. If a
    /// statement fails the transaction is rolled back and the statement's
    /// error returned, unless the rollback itself fails, in which case the
    /// rollback error is returned instead. A failed commit leaves the status
    /// untouched.
    pub fn apply_migration(&mut self, id: u64, direction: Direction) -> Result<()> {
        let migration = self
            .migrations
            .get(&id)
            .ok_or(MigrateError::MigrationNotFound(id))?;

        self.logger
            .print(format_args!("Applying migration: {}", migration.name));

        let script = migration.script(direction);
        if script.is_empty() {
            return Err(MigrateError::InvalidMigrationType { id, direction });
        }

        // Some drivers cannot run several statements at once
        let commands = self.dialect.migration_commands(script);
        self.run_in_transaction(id, direction, &commands)?;

        if let Some(migration) = self.migrations.get_mut(&id) {
            migration.status = direction.resulting_status();
        }
        Ok(())
    }

    fn run_in_transaction(&self, id: u64, direction: Direction, commands: &[String]) -> Result<()> {
        let mut tx = self.db.begin().map_err(|e| {
            self.logger
                .print(format_args!("Error opening transaction: {}", e));
            e
        })?;

        for cmd in commands {
            if cmd.trim().is_empty() {
                log::debug!(target: crate::logger::LOG_TARGET, "Skipping blank statement");
                continue;
            }
            match tx.execute(cmd, &[]) {
                Ok(Some(rows)) => {
                    log::debug!(target: crate::logger::LOG_TARGET, "Rows affected: {}", rows);
                }
                Ok(None) => {}
                Err(e) => {
                    self.logger
                        .print(format_args!("Error executing migration: {}", e));
                    return Err(self.abort(tx, e));
                }
            }
        }

        let log_sql = match direction {
            Direction::Up => self.dialect.migration_log_insert_sql(),
            Direction::Down => self.dialect.migration_log_delete_sql(),
        };
        if let Err(e) = tx.execute(&log_sql, &[SqlValue::from(id)]) {
            self.logger
                .print(format_args!("Error logging migration: {}", e));
            return Err(self.abort(tx, e));
        }

        tx.commit().map_err(|e| {
            self.logger
                .print(format_args!("Error committing transaction: {}", e));
            e.into()
        })
    }

    /// Rolls back `tx` after `cause`; a rollback failure takes precedence
    fn abort(&self, tx: Box<dyn Transaction + '_>, cause: DbError) -> MigrateError {
        match tx.rollback() {
            Ok(()) => cause.into(),
            Err(rollback_err) => {
                self.logger.print(format_args!(
                    "Error rolling back transaction: {}",
                    rollback_err
                ));
                rollback_err.into()
            }
        }
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("dialect", &self.dialect.name())
            .field("migrations", &self.migrations.keys().collect::<Vec<_>>())
            .finish()
    }
}
