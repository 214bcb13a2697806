use super::open_migrator;
use crate::config::Settings;
use anyhow::Result;
use updown_core::{Migration, MigrationStatus};

/// Prints every known migration with its applied state
pub fn run(settings: &Settings) -> Result<()> {
    let mut migrator = open_migrator(settings)?;

    if migrator.migration_table_exists()? {
        migrator.refresh_statuses()?;
    }

    let migrations = migrator.migrations(None);
    if migrations.is_empty() {
        println!("No migrations found in {}", settings.migrations_dir.display());
        return Ok(());
    }

    for migration in &migrations {
        println!("{}", format_row(migration));
    }

    let pending = migrator.migrations(Some(MigrationStatus::Inactive)).len();
    println!();
    println!("{} applied, {} pending", migrations.len() - pending, pending);
    Ok(())
}

fn format_row(migration: &Migration) -> String {
    let mark = if migration.is_active() { "x" } else { " " };
    format!("[{}] {:>6}  {}", mark, migration.id, migration.name)
}
