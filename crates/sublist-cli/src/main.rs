//! sublist CLI
//!
//! Command-line and terminal interface for managing a single mailing list.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sublist_core::metrics::sink_from_config;
use sublist_core::{Config, CreatesendClient, Store, SyncPolicy};

mod commands;
mod logging;
mod output;
mod prompt;
mod tui;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "sublist")]
#[command(about = "sublist - Manage a Campaign Monitor subscriber list")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TUI interface
    Tui,
    /// List active subscribers
    #[command(alias = "ls")]
    List,
    /// Add a subscriber, or rename an existing one
    Add {
        /// Subscriber name
        name: String,
        /// Subscriber email address
        email: String,
        /// Replace an existing subscriber with a different name without asking
        #[arg(short, long)]
        yes: bool,
        /// Return after the write instead of waiting for the list to catch up
        #[arg(long)]
        no_wait: bool,
    },
    /// Remove a subscriber
    #[command(alias = "rm")]
    Remove {
        /// Subscriber email address
        email: String,
        /// Return after the write instead of waiting for the list to catch up
        #[arg(long)]
        no_wait: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (api_base_url, max_attempts, poll_interval_secs,
        /// request_timeout_secs, log_file, metrics)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands don't need credentials or the store
    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    let command = cli.command.unwrap_or(Commands::Tui);
    if matches!(command, Commands::Tui) {
        return tui::run(config).await;
    }

    logging::init_cli_logging();
    let mut store = open_store(&config)?;

    match command {
        Commands::List => commands::subscriber::list(&mut store, &output).await,
        Commands::Add {
            name,
            email,
            yes,
            no_wait,
        } => commands::subscriber::add(&mut store, &name, &email, yes, !no_wait, &output).await,
        Commands::Remove { email, no_wait } => {
            commands::subscriber::remove(&mut store, &email, !no_wait, &output).await
        }
        Commands::Tui | Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Build a store backed by the Campaign Monitor API
pub(crate) fn open_store(config: &Config) -> Result<Store> {
    let client =
        CreatesendClient::from_config(config).context("Failed to create provider client")?;
    let store = Store::new(Arc::new(client), SyncPolicy::from_config(config))
        .with_metrics(sink_from_config(config));
    Ok(store)
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}
