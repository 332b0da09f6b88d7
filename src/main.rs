//! taskdeck CLI entry point.

use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use taskdeck::cli::{self, Cli};
use taskdeck::config::Config;
use taskdeck::db::Database;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    // Initialize logging based on --log (falling back to config)
    let level = if cli.verbose || config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log = cli
        .log
        .clone()
        .or_else(|| config.log.clone())
        .unwrap_or_else(|| "2".to_string());
    match log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new().create(true).append(true).open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let database_path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.database_path());
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    debug!(path = %database_path.display(), "opening database");
    let db = Database::open(&database_path)?;

    cli::run(cli.command, &db)
}
