//! Usage metrics
//!
//! The store and the TUI report a couple of usage events through a
//! [`MetricsSink`]. Nothing is sent anywhere by default: [`TracingMetrics`]
//! writes events to the log and [`MemoryMetrics`] keeps them for inspection.
//! Setting `metrics = false` in the config swaps in [`NoopMetrics`].

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

use crate::config::Config;

/// Domains treated as free webmail providers
pub const GENERIC_DOMAINS: &[&str] = &[
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "yahoo.com",
    "icloud.com",
    "protonmail.com",
    "aol.com",
];

/// Broad category of an email address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Generic,
    WorkOrPersonal,
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailType::Generic => write!(f, "generic"),
            EmailType::WorkOrPersonal => write!(f, "work/personal"),
        }
    }
}

/// Classify `address` by the domain after the first `@`
pub fn classify_email(address: &str) -> EmailType {
    let domain = address
        .split('@')
        .nth(1)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if GENERIC_DOMAINS.contains(&domain.as_str()) {
        EmailType::Generic
    } else {
        EmailType::WorkOrPersonal
    }
}

/// A usage event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricEvent {
    /// A subscriber add was submitted and written
    AddSubscriberClick {
        /// Seconds from the first keystroke to the submit, if typing was seen
        time_needed_secs: Option<f64>,
        email_type: EmailType,
        /// Whether the form showed an error since the last successful add
        had_field_error: bool,
    },
    /// The local list changed size
    SubscriberCount { count: usize },
}

/// Receives usage events
pub trait MetricsSink: fmt::Debug + Send + Sync {
    fn record(&self, event: &MetricEvent);
}

/// The sink selected by `config.metrics`
pub fn sink_from_config(config: &Config) -> Arc<dyn MetricsSink> {
    if config.metrics {
        Arc::new(TracingMetrics)
    } else {
        Arc::new(NoopMetrics)
    }
}

/// Writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn record(&self, event: &MetricEvent) {
        match event {
            MetricEvent::AddSubscriberClick {
                time_needed_secs,
                email_type,
                had_field_error,
            } => info!(
                target: "sublist_core::metrics",
                time_needed_secs = ?time_needed_secs,
                email_type = %email_type,
                had_field_error,
                "add_subscriber_click"
            ),
            MetricEvent::SubscriberCount { count } => {
                info!(target: "sublist_core::metrics", subscriber_count = count, "subscriber_count")
            }
        }
    }
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _event: &MetricEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryMetrics {
    events: Arc<Mutex<Vec<MetricEvent>>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, oldest first
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl MetricsSink for MemoryMetrics {
    fn record(&self, event: &MetricEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event.clone());
    }
}
