mod bus;
mod cli;
mod config;
mod error;
mod models;
mod player;
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{App, Cli};
use config::LoggingConfig;
use error::BusError;

fn main() -> Result<()> {
    let _cli = Cli::parse();
    let app = App::new()?;

    init_logging(&app.config.logging)?;

    match app.run() {
        Err(e)
            if e
                .downcast_ref::<BusError>()
                .is_some_and(BusError::is_unrecoverable) =>
        {
            error!("{e}");
            eprintln!("ERROR: Broken pipe!");
            std::process::exit(-1);
        }
        result => result,
    }
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false);

    let path = config.path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    subscriber
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}
