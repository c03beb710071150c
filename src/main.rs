use std::{process, sync::Arc};

use chrono::Utc;
use clap::Parser;
use log::{debug, error, info};
use tokio::sync::Mutex;

use nova_planner::{App, Cli, Config, GoalStorage, Result};

pub fn initialize_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    debug!("Logger initialized");
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().or_else(Config::default_path);
    let mut config = match &path {
        Some(path) => Config::load_or_create(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let mut storage = GoalStorage::new(config.clone())?;
    storage.initialize(Utc::now().date_naive())?;

    let app = App::new(
        Arc::new(Mutex::new(storage)),
        config,
        cli.config.clone(),
        cli.verbose,
    );
    app.run(cli.command).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error [{}]: {}", e.code(), e);
        process::exit(1);
    }
}
