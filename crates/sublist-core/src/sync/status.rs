//! Human-readable sync status lines

/// Shown once the provider's list matches the local list
pub const SYNCED_MESSAGE: &str = "All data up to date";

/// Shown when a session runs out of attempts
pub const EXHAUSTED_MESSAGE: &str = "Some data may still be syncing...";

/// Shown at the start of every attempt
pub fn attempt_message(attempt: u32, max_attempts: u32) -> String {
    format!(
        "Syncing... You can keep using the service. Try {}/{}",
        attempt, max_attempts
    )
}

/// Shown when the provider rejects a delete
pub fn remove_failed_message(email: &str) -> String {
    format!("Tried to remove {}, but it may already be deleted.", email)
}

/// Shown when the provider rejects an add or update
pub fn save_failed_message(email: &str) -> String {
    format!("Could not save {} to the list, it may not appear.", email)
}

/// Rough category of a status line, used for colouring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Synced,
    Syncing,
    MayStillBeSyncing,
    Neutral,
}

impl StatusTone {
    pub fn classify(status: &str) -> Self {
        if status.contains(SYNCED_MESSAGE) {
            StatusTone::Synced
        } else if status.contains("Syncing") {
            StatusTone::Syncing
        } else if status.contains("may still be syncing") {
            StatusTone::MayStillBeSyncing
        } else {
            StatusTone::Neutral
        }
    }
}
