//! Logging setup
//!
//! Both modes are filtered by the `SUBLIST_LOG` environment variable. The
//! TUI owns the terminal, so it only logs to a file and only when the
//! variable is set. One-shot commands log to stderr at `warn` by default.

use std::fs::File;

use sublist_core::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log level
pub const LOG_ENV: &str = "SUBLIST_LOG";

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::new(format!("sublist_core={},sublist_cli={}", level, level))
}

/// Initialize logging for TUI mode
///
/// Logs to `config.log_file` or `{data_local_dir}/sublist/debug.log`.
pub fn init_tui_logging(config: &Config) {
    let Ok(log_level) = std::env::var(LOG_ENV) else {
        return;
    };

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory {:?}: {}", parent, e);
            return;
        }
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(&log_level))
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("TUI logging initialized to {:?}", log_path);
}

/// Initialize logging for one-shot commands
pub fn init_cli_logging() {
    let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".to_string());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(&log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
