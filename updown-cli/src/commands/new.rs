use crate::config::Settings;
use anyhow::{Context, Result};
use updown_core::create_migration_pair;

/// Creates an empty up/down file pair with the next free id
pub fn run(settings: &Settings, name: &str) -> Result<()> {
    let (up, down) = create_migration_pair(&settings.migrations_dir, name)
        .with_context(|| format!("Failed to create migration '{}'", name))?;

    println!("Created {}", up.display());
    println!("Created {}", down.display());
    Ok(())
}
