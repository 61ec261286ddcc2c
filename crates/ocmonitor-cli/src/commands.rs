use anyhow::{Context, Result};
use ocmonitor_engine::Period;
use ocmonitor_runtime::Config;
use std::path::PathBuf;

use super::args::{Cli, Commands};
use super::handlers;

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config)?;
    let cwd = std::env::current_dir().context("cannot determine working directory")?;

    match cli.command {
        Commands::Sessions { source, limit } => handlers::sessions::handle(&config, &cwd, &source, limit),
        Commands::Live { source, interval } => handlers::live::handle(&config, &cwd, &source, interval),
        Commands::Models { source } => handlers::models::handle(&config, &cwd, &source),
        Commands::Daily { source, month, breakdown } => {
            let range = handlers::usage::month_range(month.as_deref())?;
            handlers::usage::handle(&config, &cwd, &source, Period::Daily, range, breakdown)
        }
        Commands::Weekly { source, year, start_day, breakdown } => {
            let period = Period::Weekly { start: start_day.into() };
            let range = handlers::usage::year_range(year)?;
            handlers::usage::handle(&config, &cwd, &source, period, range, breakdown)
        }
        Commands::Monthly { source, year, breakdown } => {
            let range = handlers::usage::year_range(year)?;
            handlers::usage::handle(&config, &cwd, &source, Period::Monthly, range, breakdown)
        }
        Commands::Projects { source, start_date, end_date } => {
            let range = handlers::projects::date_range(start_date.as_deref(), end_date.as_deref())?;
            handlers::projects::handle(&config, &cwd, &source, range)
        }
        Commands::Doctor => handlers::doctor::handle(&config, &cwd),
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let Some(path) = explicit.or_else(Config::default_path) else {
        return Ok(Config::default());
    };
    let config = Config::load_from(&path)?;
    Ok(config)
}
