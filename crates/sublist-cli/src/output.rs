//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::Local;
use sublist_core::{SubscriberSet, SyncPhase};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print the subscriber table
    pub fn print_subscribers(&self, subscribers: &SubscriberSet) {
        match self.format {
            OutputFormat::Human => {
                if subscribers.is_empty() {
                    println!("No subscribers.");
                    return;
                }
                let width = subscribers
                    .iter()
                    .map(|s| s.name.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max("NAME".len());
                println!("{:<width$}  EMAIL", "NAME", width = width);
                for subscriber in subscribers {
                    println!(
                        "{:<width$}  {}",
                        subscriber.name,
                        subscriber.email,
                        width = width
                    );
                }
                println!("\n{} subscriber(s)", subscribers.len());
            }
            OutputFormat::Json => match serde_json::to_string_pretty(subscribers) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize subscribers: {}", e),
            },
            OutputFormat::Quiet => {
                for subscriber in subscribers {
                    println!("{}", subscriber.email);
                }
            }
        }
    }

    /// Print a sync status line as it changes
    pub fn status(&self, status: &str, phase: SyncPhase) {
        match self.format {
            OutputFormat::Human => {
                println!("[{}] {}", Local::now().format("%H:%M:%S"), status);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"sync": phase_name(phase), "message": status})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning that doesn't fail the command
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("⚠ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "warning", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Short machine-readable name for a sync phase
pub fn phase_name(phase: SyncPhase) -> &'static str {
    match phase {
        SyncPhase::Idle => "idle",
        SyncPhase::Writing => "writing",
        SyncPhase::Polling { .. } => "polling",
        SyncPhase::Synced { .. } => "synced",
        SyncPhase::Exhausted { .. } => "exhausted",
    }
}
