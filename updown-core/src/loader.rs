//! Loading migrations from disk or from memory
//!
//! Migrations on disk are pairs of files named `{id}_{name}_{up|down}.sql`:
//!
//! ```text
//! migrations/
//!   1_create_users_up.sql
//!   1_create_users_down.sql
//!   2_add_email_up.sql
//!   2_add_email_down.sql
//! ```
//!
//! Both files of a pair share the same id and name. Files that do not follow
//! the naming convention are skipped.

use crate::error::{MigrateError, Result};
use crate::logger::Logger;
use crate::migration::{Direction, InvalidMigration, Migration};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

lazy_static! {
    static ref MIGRATION_FILE: Regex =
        Regex::new(r"^(\d+)_(.+)_(up|down)\.sql$").expect("valid migration file regex");
}

/// The parts of a migration file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub id: u64,
    pub name: String,
    pub direction: Direction,
}

/// Parses a migration file name such as `12_add_index_up.sql`.
///
/// Returns `None` for names that do not follow the convention, including ids
/// that do not fit in a `u64`.
pub fn parse_migration_path(path: &Path) -> Option<MigrationFile> {
    let file_name = path.file_name()?.to_str()?;
    let caps = MIGRATION_FILE.captures(file_name)?;

    let id = caps[1].parse::<u64>().ok()?;
    let direction = match &caps[3] {
        "up" => Direction::Up,
        _ => Direction::Down,
    };

    Some(MigrationFile {
        id,
        name: caps[2].to_string(),
        direction,
    })
}

/// A migration being assembled from one or two files
struct PartialPair {
    migration: Migration,
    seen: Vec<Direction>,
}

/// Loads every migration pair found directly under `migrations_path`.
///
/// The result is not ordered; the migrator orders migrations by id.
pub fn migrations_from_path(migrations_path: &Path, logger: &dyn Logger) -> Result<Vec<Migration>> {
    logger.print(format_args!("Migrations path: {}", migrations_path.display()));

    let escaped = glob::Pattern::escape(&migrations_path.to_string_lossy());
    let pattern = Path::new(&escaped).join("*");

    let mut pairs: BTreeMap<u64, PartialPair> = BTreeMap::new();

    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry.map_err(glob::GlobError::into_error)?;

        let file = match parse_migration_path(&path) {
            Some(file) if path.is_file() => file,
            _ => {
                logger.print(format_args!("Invalid migration file found: {}", path.display()));
                continue;
            }
        };

        logger.print(format_args!("Migration file found: {}", path.display()));
        let bytes = fs::read(&path).map_err(|e| {
            logger.print(format_args!("Error reading migration: {}", path.display()));
            e
        })?;
        let sql = String::from_utf8_lossy(&bytes).into_owned();

        add_file(&mut pairs, file, path, sql, logger)?;
    }

    for pair in pairs.values() {
        if pair.migration.validate().is_err() {
            logger.print(format_args!(
                "Invalid migration from files: {}",
                pair.migration.source
            ));
            return Err(MigrateError::InvalidMigrationPair {
                files: pair.migration.source.clone(),
            });
        }
    }

    logger.print(format_args!("Migrations file pairs found: {}", pairs.len()));

    Ok(pairs.into_values().map(|pair| pair.migration).collect())
}

fn add_file(
    pairs: &mut BTreeMap<u64, PartialPair>,
    file: MigrationFile,
    path: PathBuf,
    sql: String,
    logger: &dyn Logger,
) -> Result<()> {
    let source = path.display().to_string();

    match pairs.get_mut(&file.id) {
        Some(pair) => {
            pair.migration.source = format!("{} {}", pair.migration.source, source);

            if pair.migration.name != file.name || pair.seen.contains(&file.direction) {
                logger.print(format_args!(
                    "Mismatched migration files: {}",
                    pair.migration.source
                ));
                return Err(MigrateError::InvalidMigrationPair {
                    files: pair.migration.source.clone(),
                });
            }

            *pair.migration.script_mut(file.direction) = sql;
            pair.seen.push(file.direction);
        }
        None => {
            let mut migration = Migration::new(file.id, file.name, "", "").with_source(source);
            *migration.script_mut(file.direction) = sql;
            pairs.insert(
                file.id,
                PartialPair {
                    migration,
                    seen: vec![file.direction],
                },
            );
        }
    }

    Ok(())
}

/// Indexes in-memory migrations by id.
///
/// Every migration is reset to inactive and validated; a repeated id fails
/// with [`MigrateError::DuplicateMigration`].
pub fn index_migrations<I>(migrations: I) -> Result<BTreeMap<u64, Migration>>
where
    I: IntoIterator<Item = Migration>,
{
    let mut indexed = BTreeMap::new();

    for mut migration in migrations {
        migration.status = Default::default();
        migration.validate()?;

        if indexed.contains_key(&migration.id) {
            return Err(MigrateError::DuplicateMigration(migration.id));
        }
        indexed.insert(migration.id, migration);
    }

    Ok(indexed)
}

/// Writes an empty `up`/`down` file pair for a new migration.
///
/// The id is one more than the highest id already in `dir`. The directory is
/// created if missing and existing files are never overwritten.
pub fn create_migration_pair(dir: &Path, name: &str) -> Result<(PathBuf, PathBuf)> {
    let id = next_migration_id(dir)?;

    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(InvalidMigration {
            id,
            name: name.to_string(),
            reason: "name must be non-empty and contain no path separators".to_string(),
        }
        .into());
    }

    fs::create_dir_all(dir)?;

    let up = dir.join(format!("{id}_{name}_up.sql"));
    let down = dir.join(format!("{id}_{name}_down.sql"));
    for path in [&up, &down] {
        OpenOptions::new().write(true).create_new(true).open(path)?;
    }

    Ok((up, down))
}

fn next_migration_id(dir: &Path) -> Result<u64> {
    if !dir.exists() {
        return Ok(1);
    }

    let mut max_id = 0;
    for entry in fs::read_dir(dir)? {
        if let Some(file) = parse_migration_path(&entry?.path()) {
            max_id = max_id.max(file.id);
        }
    }

    max_id
        .checked_add(1)
        .ok_or(MigrateError::MigrationIdExhausted(max_id))
}
