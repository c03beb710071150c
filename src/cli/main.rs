use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    name = "nova",
    version,
    about = "WOOP goal planner with streaks, deadline reminders and shareable links"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(long, value_parser)]
    pub config: Option<PathBuf>,

    /// Path to the data directory
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the nova application
    #[clap(subcommand)]
    pub command: Commands,
}
