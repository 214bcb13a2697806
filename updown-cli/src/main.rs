//! # Updown CLI
//!
//! Runs versioned SQL migrations against a SQLite database.
//!
//! ## Usage
//!
//! ```bash
//! updown up                 # Apply every pending migration
//! updown down               # Roll back the latest migration
//! updown down -n 3          # Roll back the latest three
//! updown down --all         # Roll back everything
//! updown status             # List migrations and their state
//! updown new create_users   # Scaffold an empty up/down pair
//! ```
//!
//! Settings come from `updown.toml`, `UPDOWN_*` environment variables and
//! command-line options, later sources winning.

mod commands;
mod config;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::Config;
use std::path::PathBuf;

/// Versioned, reversible SQL migrations
#[derive(Parser, Debug)]
#[command(name = "updown")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./updown.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, global = true, env = "UPDOWN_DATABASE")]
    database: Option<PathBuf>,

    /// Directory holding migration files
    #[arg(short, long, global = true, env = "UPDOWN_MIGRATIONS")]
    migrations: Option<PathBuf>,

    /// Show statement-level detail
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply every pending migration
    Up,

    /// Roll back applied migrations, latest first
    Down(DownArgs),

    /// List migrations and whether they are applied
    Status,

    /// Create an empty migration file pair
    New {
        /// Migration name, e.g. create_users
        name: String,
    },
}

#[derive(Args, Debug)]
struct DownArgs {
    /// Number of migrations to roll back
    #[arg(short = 'n', long, default_value_t = 1)]
    steps: usize,

    /// Roll back every applied migration
    #[arg(long, conflicts_with = "steps")]
    all: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module(updown_core::logger::LOG_TARGET, level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Config::discover(cli.config.as_deref())?.resolve(cli.database, cli.migrations);

    match cli.command {
        Commands::Up => commands::up(&settings),
        Commands::Down(args) => commands::down(&settings, args.steps, args.all),
        Commands::Status => commands::status(&settings),
        Commands::New { name } => commands::new(&settings, &name),
    }
}
