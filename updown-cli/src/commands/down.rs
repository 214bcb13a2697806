use super::{open_migrator, plural};
use crate::config::Settings;
use anyhow::Result;

/// Rolls back the latest `steps` migrations, or all of them
pub fn run(settings: &Settings, steps: usize, all: bool) -> Result<()> {
    let mut migrator = open_migrator(settings)?;

    if !migrator.migration_table_exists()? {
        println!("Nothing to roll back");
        return Ok(());
    }

    let rolled_back = if all {
        migrator.rollback_all()?
    } else {
        migrator.rollback_n(steps)?
    };

    if rolled_back == 0 {
        println!("Nothing to roll back");
    } else {
        println!("Rolled back {} migration{}", rolled_back, plural(rolled_back));
    }
    Ok(())
}
