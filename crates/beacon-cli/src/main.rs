//! Beacon CLI - Command-line interface for the Beacon telemetry agent
//!
//! Provides commands for:
//! - Inspecting, deleting and retrying stored crash reports
//! - Viewing and validating configuration
//! - Reading the persisted profile version

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use beacon_core::config::{Config, LoggingConfig};

mod commands;
mod output;

use commands::{config::ConfigCommand, crashes::CrashesCommand, profile::ProfileCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "beacon", version, about = "Telemetry agent maintenance tool")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage crash reports held in the offline store
    #[command(subcommand)]
    Crashes(CrashesCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect the persisted profile version
    #[command(subcommand)]
    Profile(ProfileCommand),
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_path)
    }

    /// Log level from the flags, falling back to `logging.level`
    fn log_level(&self, logging: &LoggingConfig) -> String {
        if self.quiet {
            return "error".to_string();
        }
        match self.verbose {
            0 => logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `--json` output on stdout stays parseable
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_path();
    let config = Config::load_or_default(&config_path);

    init_tracing(&cli.log_level(&config.logging), config.logging.json);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match &cli.command {
        Commands::Crashes(cmd) => cmd.execute(format, &config).await,
        Commands::Config(cmd) => cmd.execute(format, &config_path).await,
        Commands::Profile(cmd) => cmd.execute(format, &config).await,
    }
}
