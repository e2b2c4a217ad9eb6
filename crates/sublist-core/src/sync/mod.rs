//! Read-after-write reconciliation
//!
//! The provider's list reads are eventually consistent: a write can take a
//! while to show up. After every mutation the store starts a session that
//! polls the provider until the list it returns matches the local list, or
//! until the attempt budget runs out.
//!
//! ## Flow
//!
//! 1. The store applies a mutation locally
//! 2. [`Reconciler::start_after_write`] queues the write, snapshots the
//!    expected list and spawns a session without waiting
//! 3. The session waits for the write to go out, then each attempt reads the
//!    full list and compares it with the snapshot
//! 4. Progress and write failures arrive as [`SyncEvent`]s on the
//!    reconciler's channel
//!
//! Only the newest session ever runs. Starting another one aborts the
//! previous task, and events tagged with an older [`SessionId`] are dropped.

mod reconciler;
mod session;
mod status;
mod writer;

pub use reconciler::{Reconciler, SyncEvent, SyncEventKind};
pub use session::{AttemptOutcome, ReconcileSession, SessionId, SyncPhase, SyncPolicy};
pub use status::{
    attempt_message, remove_failed_message, save_failed_message, StatusTone, EXHAUSTED_MESSAGE,
    SYNCED_MESSAGE,
};
pub use writer::Mutation;
