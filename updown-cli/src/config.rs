//! `updown.toml` configuration
//!
//! ```toml
//! database = "data/app.db"
//! migrations_dir = "db/migrations"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.
//! Command-line options and environment variables override file values.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "updown.toml";

/// Migrations directory used when neither the file nor the command line names one
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Values read from a configuration file
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path of the SQLite database file
    pub database: Option<PathBuf>,

    /// Directory holding `{id}_{name}_{up|down}.sql` files
    pub migrations_dir: Option<PathBuf>,
}

impl Config {
    /// Reads and parses a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.database = config.database.map(|p| base.join(p));
            config.migrations_dir = config.migrations_dir.map(|p| base.join(p));
        }
        Ok(config)
    }

    /// Loads `path` if given, otherwise the default file when it exists
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Applies command-line overrides on top of the file values
    pub fn resolve(self, database: Option<PathBuf>, migrations_dir: Option<PathBuf>) -> Settings {
        Settings {
            database: database.or(self.database),
            migrations_dir: migrations_dir
                .or(self.migrations_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR)),
        }
    }
}

/// Effective settings for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    database: Option<PathBuf>,
    pub migrations_dir: PathBuf,
}

impl Settings {
    /// The database path; commands that touch the database require one
    pub fn database(&self) -> Result<&Path> {
        self.database
            .as_deref()
            .ok_or_else(|| anyhow!("No database configured; pass --database or set UPDOWN_DATABASE"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updown.toml");
        std::fs::write(&path, "database = \"app.db\"\nmigrations_dir = \"db/migrations\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database, Some(dir.path().join("app.db")));
        assert_eq!(config.migrations_dir, Some(dir.path().join("db/migrations")));
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updown.toml");
        std::fs::write(&path, "databse = \"typo.db\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::discover(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_command_line_wins() {
        let config = Config {
            database: Some(PathBuf::from("file.db")),
            migrations_dir: Some(PathBuf::from("file_migrations")),
        };
        let settings = config.resolve(Some(PathBuf::from("cli.db")), None);
        assert_eq!(settings.database().unwrap(), Path::new("cli.db"));
        assert_eq!(settings.migrations_dir, PathBuf::from("file_migrations"));
    }

    #[test]
    fn test_defaults() {
        let settings = Config::default().resolve(None, None);
        assert_eq!(settings.migrations_dir, PathBuf::from(DEFAULT_MIGRATIONS_DIR));
        assert!(settings.database().is_err());
    }
}
