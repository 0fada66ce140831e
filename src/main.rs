mod board;
mod calendar;
mod cli;
mod commands;
mod config;
mod export;
mod fetch;
mod model;
mod service;
mod storage;
mod theme;
mod ui;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Mutex;
use storage::Store;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let store = Store::locate(args.data_dir)?;
    let command = args.command.unwrap_or(cli::Command::Tui);
    init_logging(&store, matches!(command, cli::Command::Tui))?;
    match command {
        cli::Command::Tui => commands::tui(&store),
        cli::Command::Fetch { sample } => commands::fetch(&store, sample),
        cli::Command::Config { action } => match action {
            cli::ConfigAction::Show => commands::config_show(&store),
            cli::ConfigAction::Set {
                tasks_url,
                logs_url,
                interval,
            } => commands::config_set(&store, tasks_url, logs_url, interval),
        },
        cli::Command::Theme { choice } => commands::theme(&store, choice),
        cli::Command::Export { out, month, sample } => {
            commands::export(&store, &out, month, sample)
        }
    }
}

/// The TUI owns the terminal, so it logs to a file in the data root. Other
/// commands log to stderr.
fn init_logging(store: &Store, to_file: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_env("TASKWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    if to_file {
        store.ensure_root()?;
        let path = store.log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {:?}", path))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}
