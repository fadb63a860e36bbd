//! Fencepost CLI - Command-line interface for the fencing back office.
//!
//! Runs the REST API with the campaign scheduler, and exposes the batch
//! jobs (automation pass, CSV import, bank reconciliation) and database
//! housekeeping for the terminal and cron.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use fp_core::config::{AppConfig, ConfigHandle};
use fp_core::error::FpResult;
use fp_core::logging;

/// Fencepost - back office for a fencing contractor.
#[derive(Parser)]
#[command(
    name = "fencepost",
    version,
    about = "Fencepost back office CLI",
    long_about = "A command-line interface for the Fencepost back office.\n\
                   Serve the REST API, run SMS campaigns, import CSV exports and reconcile bank feeds."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API and run the campaign scheduler until Ctrl-C.
    Serve {
        /// Serve the API without the background scheduler.
        #[arg(long)]
        no_scheduler: bool,
    },
    /// SMS automation campaigns.
    Automation {
        #[command(subcommand)]
        action: commands::automation::AutomationAction,
    },
    /// List, enable and disable campaigns.
    Campaigns {
        #[command(subcommand)]
        action: commands::campaigns::CampaignsAction,
    },
    /// Import CSV files and print import templates.
    Import {
        #[command(subcommand)]
        action: commands::import::ImportAction,
    },
    /// Bank feed sync, statement upload and staff allocation.
    Bank {
        #[command(subcommand)]
        action: commands::bank::BankAction,
    },
    /// Database management commands.
    Db {
        #[command(subcommand)]
        action: commands::db::DbAction,
    },
}

#[tokio::main]
async fn main() -> FpResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_default()?,
    };

    // Initialize logging
    let log_level = if cli.verbose { "debug".to_string() } else { config.logging.level.clone() };
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| PathBuf::from("logs"));
    let _guard = logging::init_logging(&log_level, &log_dir, config.logging.json_output)?;

    let config_handle = ConfigHandle::new(config);

    info!("Fencepost CLI v{}", fp_core::constants::APP_VERSION);

    match cli.command {
        Commands::Serve { no_scheduler } => commands::serve::run(config_handle, no_scheduler).await,
        Commands::Automation { action } => {
            commands::automation::run(config_handle, action, cli.format).await
        }
        Commands::Campaigns { action } => {
            commands::campaigns::run(config_handle, action, cli.format).await
        }
        Commands::Import { action } => commands::import::run(config_handle, action, cli.format).await,
        Commands::Bank { action } => commands::bank::run(config_handle, action, cli.format).await,
        Commands::Db { action } => commands::db::run(config_handle, action, cli.format).await,
    }
}
