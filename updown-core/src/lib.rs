//! # Updown
//!
//! Versioned, reversible SQL schema migrations with pluggable dialects.
//!
//! A migration is a numbered pair of scripts: `up` applies a change and
//! `down` reverts it. Applied migrations are recorded in a metadata table
//! inside the target database, so a [`Migrator`] always knows which
//! migrations still need to run.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use updown_core::{Migrator, SqliteDatabase, Sqlite};
//!
//! fn main() -> updown_core::Result<()> {
//!     let db = Arc::new(SqliteDatabase::open("app.db")?);
//!     let mut migrator = Migrator::from_path(db, Box::new(Sqlite), "migrations")?;
//!
//!     let applied = migrator.migrate()?;
//!     println!("applied {} migrations", applied);
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! Files are named `{id}_{name}_{up|down}.sql`, for example:
//!
//! ```text
//! migrations/
//! ├── 1_create_users_up.sql
//! ├── 1_create_users_down.sql
//! ├── 2_add_posts_up.sql
//! └── 2_add_posts_down.sql
//! ```
//!
//! Both files of a pair must share the same name. Migrations are applied in
//! ascending id order and rolled back in descending id order.
//!
//! ## Features
//!
//! - **Atomic migrations**: each migration and its bookkeeping row commit together
//! - **Dialects**: PostgreSQL, CockroachDB, MySQL, MariaDB, SQLite, SQL Server
//! - **MySQL delimiters**: scripts may declare a custom statement delimiter
//! - **SQLite backend**: ready to use behind the `sqlite` feature (default)
//!
//! Other databases plug in by implementing [`Database`] and [`Transaction`].

pub mod database;
pub mod dialect;
pub mod error;
pub mod loader;
pub mod logger;
pub mod migration;
pub mod migrator;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use database::{Database, DbError, SqlValue, Transaction};
pub use dialect::{
    CockroachDb, Dialect, DialectKind, MariaDb, MsSql, MySql, Postgres, Sqlite, MIGRATIONS_TABLE,
};
pub use error::{MigrateError, Result};
pub use loader::{create_migration_pair, migrations_from_path};
pub use logger::{LogLogger, Logger, NopLogger};
pub use migration::{Direction, InvalidMigration, Migration, MigrationStatus};
pub use migrator::Migrator;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
