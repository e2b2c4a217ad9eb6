//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use sublist_core::Config;

use crate::output::{Output, OutputFormat};

/// Keys accepted by `config set`
const KEYS: &str =
    "api_base_url, max_attempts, poll_interval_secs, request_timeout_secs, log_file, metrics";

/// Show current configuration
///
/// Credentials are only reported as set or not set.
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let credentials = if config.has_credentials() {
        "set"
    } else {
        "not set"
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "api_base_url": config.api_base_url,
                    "max_attempts": config.max_attempts,
                    "poll_interval_secs": config.poll_interval_secs,
                    "request_timeout_secs": config.request_timeout_secs,
                    "log_file": config.log_file,
                    "metrics": config.metrics,
                    "credentials": credentials
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.api_base_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  api_base_url:         {}", config.api_base_url);
            println!("  max_attempts:         {}", config.max_attempts);
            println!("  poll_interval_secs:   {}", config.poll_interval_secs);
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  metrics:              {}", config.metrics);
            println!("  credentials:          {}", credentials);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    let mut config = Config::load_file(&save_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "api_base_url" => {
            if value.is_empty() {
                bail!("api_base_url cannot be empty");
            }
            config.api_base_url = value.trim_end_matches('/').to_string();
        }
        "max_attempts" => {
            let n: u32 = value
                .parse()
                .context("Invalid value for max_attempts. Use a positive number.")?;
            if n == 0 {
                bail!("max_attempts must be at least 1");
            }
            config.max_attempts = n;
        }
        "poll_interval_secs" => {
            config.poll_interval_secs = value
                .parse()
                .context("Invalid value for poll_interval_secs. Use a number of seconds.")?;
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use a number of seconds.")?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        "metrics" => {
            config.metrics = value
                .parse()
                .context("Invalid value for metrics. Use true or false.")?;
        }
        "api_key" | "list_id" => {
            bail!("Credentials are read from CM_API_KEY and CM_LIST_ID only");
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS
            );
        }
    }

    Ok(())
}
