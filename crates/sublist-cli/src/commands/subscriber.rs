//! Subscriber command handlers
//!
//! `add` and `remove` follow the same flow as the TUI: load the list, stage
//! the change locally, commit it, then (unless `--no-wait`) follow the
//! reconciliation session until it settles. `--no-wait` still waits for the
//! write itself.

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use sublist_core::metrics::{classify_email, MetricEvent};
use sublist_core::{AddError, AddOutcome, Mutation, Store, SyncEvent, SyncEventKind};

use crate::output::Output;
use crate::prompt::confirm;

/// List active subscribers
pub async fn list(store: &mut Store, output: &Output) -> Result<()> {
    store.load().await.context("Failed to load subscribers")?;
    output.print_subscribers(store.subscribers());
    Ok(())
}

/// Add a subscriber, asking before replacing a different name
pub async fn add(
    store: &mut Store,
    name: &str,
    email: &str,
    yes: bool,
    wait: bool,
    output: &Output,
) -> Result<()> {
    let mut events = store
        .take_events()
        .context("Sync events already taken")?;
    store.load().await.context("Failed to load subscribers")?;

    let mutation = match store.stage_add(name, email) {
        Ok(AddOutcome::Staged(mutation)) => mutation,
        Ok(AddOutcome::NeedsConfirmation(conflict)) => {
            let accepted = yes || (output.should_prompt() && confirm(&conflict.prompt())?);
            if !accepted {
                output.message("Subscriber left unchanged.");
                return Ok(());
            }
            store.confirm_replace(conflict)
        }
        Err(e @ AddError::AlreadyExists { .. }) => {
            output.message(&e.to_string());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let Mutation::Upsert(subscriber) = &mutation else {
        unreachable!("staging an add always yields an upsert");
    };
    store.metrics().record(&MetricEvent::AddSubscriberClick {
        time_needed_secs: None,
        email_type: classify_email(&subscriber.email),
        had_field_error: false,
    });
    let done = format!("Added {} <{}>", subscriber.name, subscriber.email);

    commit_and_follow(store, mutation, &mut events, &done, wait, output).await
}

/// Remove a subscriber
pub async fn remove(store: &mut Store, email: &str, wait: bool, output: &Output) -> Result<()> {
    let mut events = store
        .take_events()
        .context("Sync events already taken")?;
    store.load().await.context("Failed to load subscribers")?;

    let email = email.trim();
    let mutation = store.stage_remove(email);
    let done = format!("Removed {}", email);

    commit_and_follow(store, mutation, &mut events, &done, wait, output).await
}

/// Commit, report the write, then follow the session unless told not to
///
/// The session only polls once the write has gone out, so its first attempt
/// marks the point where the write result is known.
async fn commit_and_follow(
    store: &mut Store,
    mutation: Mutation,
    events: &mut mpsc::UnboundedReceiver<SyncEvent>,
    done: &str,
    wait: bool,
    output: &Output,
) -> Result<()> {
    let session = store.commit(mutation);
    let mut write_failed = false;

    while let Some(event) = events.recv().await {
        if !store.apply_sync_event(&event) {
            continue;
        }

        match &event.kind {
            SyncEventKind::WriteFailed { error, .. } => {
                write_failed = true;
                output.warning(&format!("{} ({})", store.status(), error));
                continue;
            }
            SyncEventKind::AttemptStarted { attempt: 1, .. } if event.session == session => {
                if !write_failed {
                    output.success(done);
                }
                if !wait {
                    break;
                }
            }
            _ => {}
        }

        if let Some(status) = event.status_message() {
            output.status(&status, store.phase());
        }
        if event.is_terminal() {
            break;
        }
    }

    Ok(())
}
