//! Subcommand implementations

mod down;
mod new;
mod status;
mod up;

pub use down::run as down;
pub use new::run as new;
pub use status::run as status;
pub use up::run as up;

use crate::config::Settings;
use anyhow::{Context, Result};
use std::sync::Arc;
use updown_core::{Migrator, Sqlite, SqliteDatabase};

/// Opens the configured database and loads the migrations directory
fn open_migrator(settings: &Settings) -> Result<Migrator> {
    let path = settings.database()?;
    let db = SqliteDatabase::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;

    Migrator::from_path(Arc::new(db), Box::new(Sqlite), &settings.migrations_dir).with_context(
        || {
            format!(
                "Failed to load migrations from {}",
                settings.migrations_dir.display()
            )
        },
    )
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
