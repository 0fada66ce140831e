use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "taskwatch",
    version,
    about = "Terminal dashboard for a remotely published task board"
)]
pub struct Cli {
    /// Directory for settings, caches and the log file
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch the interactive dashboard
    Tui,
    /// Fetch tasks and logs once and print a summary
    Fetch {
        /// Use the bundled sample data instead of the configured source
        #[arg(long)]
        sample: bool,
    },
    /// Show or change the saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Pick the colour theme
    Theme {
        #[arg(value_enum)]
        choice: ThemeChoice,
    },
    /// Write an HTML snapshot of the board and a calendar month
    Export {
        /// Output file
        #[arg(long)]
        out: PathBuf,
        /// Month to render as YYYY-MM (defaults to the current month)
        #[arg(long)]
        month: Option<String>,
        /// Use the bundled sample data instead of the configured source
        #[arg(long)]
        sample: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the saved settings
    Show,
    /// Update one or more settings
    Set {
        /// Tasks JSON URL, Drive share link or Drive file id (empty to clear)
        #[arg(long)]
        tasks_url: Option<String>,
        /// Daily logs JSON URL, Drive share link or Drive file id (empty to clear)
        #[arg(long)]
        logs_url: Option<String>,
        /// Refresh interval in seconds
        #[arg(long)]
        interval: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeChoice {
    Light,
    Dark,
    /// Forget the saved choice and follow the terminal
    System,
}
