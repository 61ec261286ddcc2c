use clap::{Args, Parser, Subcommand};
use ocmonitor_providers::SourceMode;
use std::path::PathBuf;

use crate::types::{LogLevel, WeekStart};

#[derive(Parser)]
#[command(name = "ocmonitor")]
#[command(about = "Monitor token usage and costs of OpenCode sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: <config_dir>/ocmonitor/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "warn", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that read sessions or prices
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Session backend: auto, sqlite or files
    #[arg(long, default_value = "auto")]
    pub source: SourceMode,

    /// Do not read or fetch remote pricing for this run
    #[arg(long)]
    pub no_remote: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Summarize workflows with token usage and cost")]
    Sessions {
        #[command(flatten)]
        source: SourceArgs,

        /// Show only the newest N workflows
        #[arg(long)]
        limit: Option<usize>,
    },

    #[command(about = "Follow the current workflow as it runs")]
    Live {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between polls (default from config)
        #[arg(long)]
        interval: Option<u64>,
    },

    #[command(about = "Show resolved model prices and where each field came from")]
    Models {
        #[command(flatten)]
        source: SourceArgs,
    },

    #[command(about = "Usage and cost per day")]
    Daily {
        #[command(flatten)]
        source: SourceArgs,

        /// Only this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,

        /// Show a line per model under each day
        #[arg(long)]
        breakdown: bool,
    },

    #[command(about = "Usage and cost per week")]
    Weekly {
        #[command(flatten)]
        source: SourceArgs,

        /// Only this year
        #[arg(long)]
        year: Option<i32>,

        #[arg(long, default_value = "monday")]
        start_day: WeekStart,

        /// Show a line per model under each week
        #[arg(long)]
        breakdown: bool,
    },

    #[command(about = "Usage and cost per month")]
    Monthly {
        #[command(flatten)]
        source: SourceArgs,

        /// Only this year
        #[arg(long)]
        year: Option<i32>,

        /// Show a line per model under each month
        #[arg(long)]
        breakdown: bool,
    },

    #[command(about = "Usage and cost per project")]
    Projects {
        #[command(flatten)]
        source: SourceArgs,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
    },

    #[command(about = "Check session backends and pricing sources")]
    Doctor,
}
