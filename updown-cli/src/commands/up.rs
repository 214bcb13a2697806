use super::{open_migrator, plural};
use crate::config::Settings;
use anyhow::Result;

/// Applies every pending migration
pub fn run(settings: &Settings) -> Result<()> {
    let mut migrator = open_migrator(settings)?;
    let applied = migrator.migrate()?;

    if applied == 0 {
        println!("Database is up to date");
    } else {
        println!("Applied {} migration{}", applied, plural(applied));
    }
    Ok(())
}
