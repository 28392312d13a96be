//! pointsync - signal point table to Modbus device configuration
//!
//! Reads the field team's signal point table (`信号点表.csv` / `信号点表.xlsx`)
//! and rebuilds the `devices` section of the poller's `config.yaml`, keeping
//! its `global` section as is.

mod commands;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "pointsync")]
#[command(about = "Sync a signal point table into the Modbus poller configuration")]
#[command(long_about = "Sync a signal point table into the Modbus poller configuration

Commands:
  sync        Rebuild the devices section of the config from the point table
  validate    Check the point table without touching the config

Examples:
  pointsync sync                        # Auto-detect 信号点表.csv / 信号点表.xlsx
  pointsync sync --dry-run              # Print the resulting config instead of writing it
  pointsync -i points.xlsx --sheet IO sync
  pointsync validate --strict           # Also flag inconsistent transport columns")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Poller configuration file (default: config.yaml)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Point table file (default: auto-detect 信号点表.csv, then 信号点表.xlsx)
    #[arg(short = 'i', long = "input", global = true)]
    input: Option<PathBuf>,

    /// Worksheet name for .xlsx/.xls tables (default: first sheet)
    #[arg(long, global = true)]
    sheet: Option<String>,

    /// Settings file (default: ./pointsync.yaml if present)
    #[arg(long = "settings", global = true, env = "POINTSYNC_SETTINGS")]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the devices section of the config from the point table
    Sync {
        /// Print the resulting config instead of writing it
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Fail when rows of one device disagree on transport parameters
        #[arg(long)]
        strict: bool,
    },

    /// Validate the point table without touching the config
    Validate {
        /// Fail when rows of one device disagree on transport parameters
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "ERROR".red(), e);
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<bool> {
    let mut settings = Settings::load(cli.settings.as_deref())?;
    if let Some(config) = cli.config {
        settings.config_path = config;
    }
    if let Some(sheet) = cli.sheet {
        settings.sheet = Some(sheet);
    }

    match cli.command {
        Commands::Sync { dry_run, strict } => {
            settings.strict_transport |= strict;
            commands::handle_sync(&settings, cli.input.as_deref(), dry_run)?;
            Ok(true)
        },
        Commands::Validate { strict } => {
            settings.strict_transport |= strict;
            commands::handle_validate(&settings, cli.input.as_deref())
        },
    }
}
