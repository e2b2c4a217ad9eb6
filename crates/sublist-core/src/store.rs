//! Client state store
//!
//! The `Store` owns everything the presentation layer shows:
//! - the subscriber list as last known locally
//! - the name and email inputs of the add form
//! - a human-readable sync status line
//!
//! Mutations are optimistic and happen in two steps. Staging applies the
//! change locally and returns a [`Mutation`]; committing hands the write to
//! the reconciler's background writer and starts a session that polls once
//! the write has gone out. Neither step waits on the network, and the caller
//! can redraw between the two.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::new(provider, SyncPolicy::default());
//! let mut events = store.take_events().unwrap();
//! store.load().await?;
//!
//! if let AddOutcome::Staged(mutation) = store.stage_add("Bob", "bob@x.com")? {
//!     store.commit(mutation);
//! }
//!
//! while let Some(event) = events.recv().await {
//!     store.apply_sync_event(&event);
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics::{MetricEvent, MetricsSink, TracingMetrics};
use crate::models::{Subscriber, SubscriberSet};
use crate::provider::{ListProvider, ProviderResult};
use crate::sync::{Mutation, Reconciler, SessionId, SyncEvent, SyncEventKind, SyncPhase, SyncPolicy};
use crate::validation::{validate, ValidationError};

/// Why an add was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Subscriber already exists.")]
    AlreadyExists { email: String },
}

/// An add whose email already exists under a different name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub existing: Subscriber,
    pub replacement: Subscriber,
}

impl Conflict {
    /// Question to ask before replacing
    pub fn prompt(&self) -> String {
        format!(
            "This email already exists with a different name (\"{}\"). Replace it with \"{}\"?",
            self.existing.name, self.replacement.name
        )
    }
}

/// Result of staging an add
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Applied locally; commit the mutation to send it
    Staged(Mutation),
    /// Nothing changed yet; call [`Store::confirm_replace`] to go ahead
    NeedsConfirmation(Conflict),
}

/// Client state store
pub struct Store {
    provider: Arc<dyn ListProvider>,
    reconciler: Reconciler,
    metrics: Arc<dyn MetricsSink>,
    subscribers: SubscriberSet,
    name_input: String,
    email_input: String,
    status: String,
    phase: SyncPhase,
    current_session: Option<SessionId>,
    reported_count: Option<usize>,
}

impl Store {
    pub fn new(provider: Arc<dyn ListProvider>, policy: SyncPolicy) -> Self {
        Self {
            reconciler: Reconciler::new(provider.clone(), policy),
            provider,
            metrics: Arc::new(TracingMetrics),
            subscribers: SubscriberSet::new(),
            name_input: String::new(),
            email_input: String::new(),
            status: String::new(),
            phase: SyncPhase::Idle,
            current_session: None,
            reported_count: None,
        }
    }

    /// Replace the default metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Take the sync event receiver (can only be called once)
    ///
    /// Feed every event to [`Store::apply_sync_event`].
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.reconciler.take_events()
    }

    // ==================== Queries ====================

    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.current_session
    }

    /// Whether a reconciliation session is still polling
    pub fn is_syncing(&self) -> bool {
        self.reconciler.is_running()
    }

    pub fn policy(&self) -> SyncPolicy {
        self.reconciler.policy()
    }

    pub fn metrics(&self) -> &dyn MetricsSink {
        self.metrics.as_ref()
    }

    // ==================== Form ====================

    pub fn name_input(&self) -> &str {
        &self.name_input
    }

    pub fn email_input(&self) -> &str {
        &self.email_input
    }

    pub fn set_name_input(&mut self, name: impl Into<String>) {
        self.name_input = name.into();
    }

    pub fn set_email_input(&mut self, email: impl Into<String>) {
        self.email_input = email.into();
    }

    pub fn clear_inputs(&mut self) {
        self.name_input.clear();
        self.email_input.clear();
    }

    /// Stage an add from the current form inputs
    pub fn submit_form(&mut self) -> Result<AddOutcome, AddError> {
        let name = self.name_input.clone();
        let email = self.email_input.clone();
        self.stage_add(&name, &email)
    }

    // ==================== Loading ====================

    /// Replace the local list with the provider's current list
    ///
    /// On failure the list is left empty and the error becomes the status.
    pub async fn load(&mut self) -> ProviderResult<()> {
        match self.provider.list_active().await {
            Ok(subscribers) => {
                info!("Loaded {} subscribers", subscribers.len());
                self.subscribers = subscribers;
                self.report_count();
                Ok(())
            }
            Err(e) => {
                warn!("Initial load failed: {}", e);
                self.subscribers = SubscriberSet::new();
                self.status = format!("Could not load subscribers: {}", e);
                self.report_count();
                Err(e)
            }
        }
    }

    // ==================== Mutations ====================

    /// Validate and stage an add
    ///
    /// A new email is applied locally right away and the form is cleared.
    /// An identical record is refused, and a different name for a known email
    /// needs confirmation first.
    pub fn stage_add(&mut self, name: &str, email: &str) -> Result<AddOutcome, AddError> {
        let subscriber = validate(name, email)?;

        if let Some(existing) = self.subscribers.get(&subscriber.email) {
            if existing.name == subscriber.name {
                debug!("Ignoring duplicate add for {}", subscriber.email);
                return Err(AddError::AlreadyExists {
                    email: subscriber.email,
                });
            }

            return Ok(AddOutcome::NeedsConfirmation(Conflict {
                existing: existing.clone(),
                replacement: subscriber,
            }));
        }

        Ok(AddOutcome::Staged(self.apply_upsert(subscriber)))
    }

    /// Accept a conflicting add, replacing the existing record
    pub fn confirm_replace(&mut self, conflict: Conflict) -> Mutation {
        info!(
            "Replacing {} ({:?} -> {:?})",
            conflict.replacement.email, conflict.existing.name, conflict.replacement.name
        );
        self.apply_upsert(conflict.replacement)
    }

    /// Stage a delete
    ///
    /// The record is removed locally even if the provider later rejects the
    /// delete.
    pub fn stage_remove(&mut self, email: &str) -> Mutation {
        if self.subscribers.remove(email).is_none() {
            debug!("{} not in local list, deleting remotely anyway", email);
        }
        self.report_count();
        Mutation::Remove {
            email: email.to_string(),
        }
    }

    /// Queue a staged mutation and start reconciling
    ///
    /// Returns as soon as the write is queued. A rejected write arrives later
    /// as a [`SyncEventKind::WriteFailed`] event, which sets the status and
    /// never rolls the local change back.
    pub fn commit(&mut self, mutation: Mutation) -> SessionId {
        debug!("Committing write for {}", mutation.email());
        let session = self.reconciler.start_after_write(mutation, self.subscribers.clone());
        self.current_session = Some(session);
        self.phase = SyncPhase::Writing;
        session
    }

    // ==================== Sync ====================

    /// Apply a sync event, returning false if it was ignored
    ///
    /// Write failures apply even when they come from an old session. Anything
    /// else from an old session is dropped.
    pub fn apply_sync_event(&mut self, event: &SyncEvent) -> bool {
        let is_write_failure = matches!(event.kind, SyncEventKind::WriteFailed { .. });
        if !is_write_failure && self.current_session != Some(event.session) {
            debug!("Ignoring event from stale session {}", event.session);
            return false;
        }

        if let Some(phase) = event.phase() {
            self.phase = phase;
        }
        if let Some(status) = event.status_message() {
            self.status = status;
        }
        true
    }

    fn apply_upsert(&mut self, subscriber: Subscriber) -> Mutation {
        self.subscribers.upsert(subscriber.clone());
        self.clear_inputs();
        self.report_count();
        Mutation::Upsert(subscriber)
    }

    fn report_count(&mut self) {
        let count = self.subscribers.len();
        if self.reported_count != Some(count) {
            self.reported_count = Some(count);
            self.metrics.record(&MetricEvent::SubscriberCount { count });
        }
    }
}
