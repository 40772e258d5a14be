//! Weft CLI - Command-line interface for the weft host runtime.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;

use settings::Settings;

/// Weft host runtime for state-transition wasm guests
#[derive(Parser)]
#[command(name = "weft")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Output format options.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl OutputFormat {
    /// Serialize `value` for the JSON formats.
    pub fn to_json<T: serde::Serialize>(self, value: &T) -> serde_json::Result<String> {
        match self {
            Self::JsonCompact => serde_json::to_string(value),
            _ => serde_json::to_string_pretty(value),
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Call an entry point of a guest module
    Run(commands::run::RunArgs),
    /// Check a guest module against the host function table
    Validate(commands::validate::ValidateArgs),
    /// Inspect a guest module
    Inspect(commands::inspect::InspectArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Guest log output is emitted under the `runtime` target.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("weft={log_level},runtime={log_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {:#}", e);
            }
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &settings, cli.format, cli.quiet),
        Commands::Validate(args) => commands::validate::execute(args, &settings, cli.format),
        Commands::Inspect(args) => commands::inspect::execute(args, &settings, cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
