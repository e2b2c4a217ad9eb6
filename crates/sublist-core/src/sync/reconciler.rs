//! Reconciliation driver
//!
//! Runs one [`ReconcileSession`] at a time as a tokio task. Starting a new
//! session aborts the previous task, which cancels its pending timer and any
//! read still in flight. Progress is reported as [`SyncEvent`]s tagged with
//! the session id so the owner can drop anything from a superseded session.
//!
//! A session started after a write first waits for the write to go out on
//! the background [`Writer`], then polls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::{AttemptOutcome, ReconcileSession, SessionId, SyncPhase, SyncPolicy};
use super::status::{
    attempt_message, remove_failed_message, save_failed_message, EXHAUSTED_MESSAGE,
    SYNCED_MESSAGE,
};
use super::writer::{Mutation, Writer};
use crate::models::SubscriberSet;
use crate::provider::ListProvider;

/// Progress report from a session task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub session: SessionId,
    pub kind: SyncEventKind,
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEventKind {
    /// The provider rejected the write this session follows
    WriteFailed { mutation: Mutation, error: String },
    /// A read is about to be issued
    AttemptStarted { attempt: u32, max_attempts: u32 },
    /// The read for `attempt` failed; the attempt still counts
    ReadFailed { attempt: u32, error: String },
    /// Provider matched the expected set
    Synced { attempts: u32 },
    /// Attempts ran out without a match
    Exhausted { attempts: u32 },
}

impl SyncEvent {
    /// Phase the session is in after this event, if it changes
    pub fn phase(&self) -> Option<SyncPhase> {
        match self.kind {
            SyncEventKind::WriteFailed { .. } => None,
            SyncEventKind::AttemptStarted {
                attempt,
                max_attempts,
            } => Some(SyncPhase::Polling {
                attempt,
                max_attempts,
            }),
            SyncEventKind::ReadFailed { .. } => None,
            SyncEventKind::Synced { attempts } => Some(SyncPhase::Synced { attempts }),
            SyncEventKind::Exhausted { attempts } => Some(SyncPhase::Exhausted { attempts }),
        }
    }

    /// Status line to show for this event, if it changes
    pub fn status_message(&self) -> Option<String> {
        match &self.kind {
            SyncEventKind::WriteFailed { mutation, .. } => Some(match mutation {
                Mutation::Upsert(subscriber) => save_failed_message(&subscriber.email),
                Mutation::Remove { email } => remove_failed_message(email),
            }),
            SyncEventKind::AttemptStarted {
                attempt,
                max_attempts,
            } => Some(attempt_message(*attempt, *max_attempts)),
            SyncEventKind::ReadFailed { .. } => None,
            SyncEventKind::Synced { .. } => Some(SYNCED_MESSAGE.to_string()),
            SyncEventKind::Exhausted { .. } => Some(EXHAUSTED_MESSAGE.to_string()),
        }
    }

    /// Whether this is the last event of its session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            SyncEventKind::Synced { .. } | SyncEventKind::Exhausted { .. }
        )
    }
}

/// Owns the single active reconciliation task
pub struct Reconciler {
    provider: Arc<dyn ListProvider>,
    policy: SyncPolicy,
    /// Id of the newest session; older tasks stop once they see it move
    latest: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    writer: Option<Writer>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SyncEvent>>,
}

impl Reconciler {
    pub fn new(provider: Arc<dyn ListProvider>, policy: SyncPolicy) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            policy,
            latest: Arc::new(AtomicU64::new(0)),
            task: None,
            writer: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Whether a session task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start a session expecting `expected`, replacing any running one
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, expected: SubscriberSet) -> SessionId {
        let id = self.next_session(&expected);
        self.spawn_session(id, expected, None);
        id
    }

    /// Queue `mutation` and start a session that polls once it has been sent
    ///
    /// Returns without waiting for the write. Must be called from within a
    /// tokio runtime.
    pub fn start_after_write(&mut self, mutation: Mutation, expected: SubscriberSet) -> SessionId {
        let id = self.next_session(&expected);

        let provider = self.provider.clone();
        let events = self.event_tx.clone();
        let writer = self.writer.get_or_insert_with(|| Writer::spawn(provider, events));
        let written = writer.submit(id, mutation);

        self.spawn_session(id, expected, Some(written));
        id
    }

    fn next_session(&mut self, expected: &SubscriberSet) -> SessionId {
        self.abort_task();

        let id = SessionId::new(self.latest.fetch_add(1, Ordering::SeqCst) + 1);
        info!(
            "Starting sync session {} (expecting {} subscribers, {} attempts every {:?})",
            id,
            expected.len(),
            self.policy.max_attempts,
            self.policy.interval
        );
        id
    }

    fn spawn_session(
        &mut self,
        id: SessionId,
        expected: SubscriberSet,
        written: Option<oneshot::Receiver<()>>,
    ) {
        let session = ReconcileSession::new(id, expected, self.policy);
        self.task = Some(tokio::spawn(run_session(
            self.provider.clone(),
            session,
            written,
            self.latest.clone(),
            self.event_tx.clone(),
        )));
    }

    /// Stop the running session, if any
    pub fn cancel(&mut self) {
        if self.abort_task() {
            // Anything the aborted task already queued is now stale
            self.latest.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn abort_task(&mut self) -> bool {
        match self.task.take() {
            Some(task) if !task.is_finished() => {
                debug!("Cancelling running sync session");
                task.abort();
                true
            }
            _ => false,
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.abort_task();
    }
}

fn is_current(latest: &AtomicU64, id: SessionId) -> bool {
    latest.load(Ordering::SeqCst) == id.get()
}

/// Poll until the provider matches, attempts run out, or the session is superseded
async fn run_session(
    provider: Arc<dyn ListProvider>,
    mut session: ReconcileSession,
    written: Option<oneshot::Receiver<()>>,
    latest: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<SyncEvent>,
) {
    let id = session.id();
    let policy = session.policy();

    let emit = |kind: SyncEventKind| events.send(SyncEvent { session: id, kind }).is_ok();

    if let Some(written) = written {
        // An error only means the write task is gone; poll anyway
        if written.await.is_err() {
            warn!("Sync session {}: write task ended early", id);
        }
    }

    loop {
        if !is_current(&latest, id) {
            debug!("Sync session {} superseded", id);
            return;
        }

        let attempt = session.begin_attempt();
        debug!("Sync session {}: attempt {}/{}", id, attempt, policy.max_attempts);
        if !emit(SyncEventKind::AttemptStarted {
            attempt,
            max_attempts: policy.max_attempts,
        }) {
            return;
        }

        let observed = match provider.list_active().await {
            Ok(observed) => Some(observed),
            Err(e) => {
                warn!("Sync session {}: read {} failed: {}", id, attempt, e);
                if !emit(SyncEventKind::ReadFailed {
                    attempt,
                    error: e.to_string(),
                }) {
                    return;
                }
                None
            }
        };

        if !is_current(&latest, id) {
            debug!("Sync session {} superseded during read", id);
            return;
        }

        match session.evaluate(observed.as_ref()) {
            AttemptOutcome::Synced => {
                info!("Sync session {} matched after {} attempt(s)", id, attempt);
                emit(SyncEventKind::Synced { attempts: attempt });
                return;
            }
            AttemptOutcome::Exhausted => {
                info!("Sync session {} gave up after {} attempt(s)", id, attempt);
                emit(SyncEventKind::Exhausted { attempts: attempt });
                return;
            }
            AttemptOutcome::Retry => {
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::Subscriber;
    use crate::provider::MemoryProvider;

    const INTERVAL: Duration = Duration::from_secs(12);

    fn bob() -> Subscriber {
        Subscriber::new("Bob", "bob@x.com")
    }

    async fn collect_until_terminal(
        rx: &mut mpsc::UnboundedReceiver<SyncEvent>,
        session: SessionId,
    ) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event.session == session && event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_synced_on_third_read() {
        let provider = Arc::new(MemoryProvider::new().with_visibility_lag(2));
        provider.upsert(&bob()).await.unwrap();

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(20, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        let session = reconciler.start(vec![bob()].into());
        let events = collect_until_terminal(&mut rx, session).await;

        let last = events.last().unwrap();
        assert_eq!(last.kind, SyncEventKind::Synced { attempts: 3 });
        assert_eq!(last.status_message().as_deref(), Some("All data up to date"));
        assert_eq!(provider.read_count(), 3);

        let started: Vec<_> = events
            .iter()
            .filter_map(|e| e.status_message())
            .collect();
        assert_eq!(
            started,
            vec![
                "Syncing... You can keep using the service. Try 1/20".to_string(),
                "Syncing... You can keep using the service. Try 2/20".to_string(),
                "Syncing... You can keep using the service. Try 3/20".to_string(),
                "All data up to date".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let provider = Arc::new(MemoryProvider::new().frozen());
        provider.upsert(&bob()).await.unwrap();

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(20, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        let session = reconciler.start(vec![bob()].into());
        let events = collect_until_terminal(&mut rx, session).await;

        assert_eq!(
            events.last().unwrap().kind,
            SyncEventKind::Exhausted { attempts: 20 }
        );
        assert_eq!(
            events.last().unwrap().status_message().as_deref(),
            Some("Some data may still be syncing...")
        );

        let times = provider.read_times();
        assert_eq!(times.len(), 20);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], INTERVAL);
        }

        // Nothing else is scheduled
        tokio::time::sleep(INTERVAL * 10).await;
        assert_eq!(provider.read_count(), 20);
        assert!(rx.try_recv().is_err());
        assert!(!reconciler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reads_count_as_attempts() {
        let provider = Arc::new(MemoryProvider::new());
        provider.fail_next_reads(10);

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(3, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        let session = reconciler.start(SubscriberSet::new());
        let events = collect_until_terminal(&mut rx, session).await;

        let failures = events
            .iter()
            .filter(|e| matches!(e.kind, SyncEventKind::ReadFailed { .. }))
            .count();
        assert_eq!(failures, 3);
        assert_eq!(
            events.last().unwrap().kind,
            SyncEventKind::Exhausted { attempts: 3 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failed_read() {
        let provider = Arc::new(MemoryProvider::new());
        provider.fail_next_reads(1);

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(5, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        let session = reconciler.start(SubscriberSet::new());
        let events = collect_until_terminal(&mut rx, session).await;

        assert_eq!(
            events.last().unwrap().kind,
            SyncEventKind::Synced { attempts: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_supersedes_old() {
        let provider = Arc::new(MemoryProvider::new());

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(20, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        // Never satisfiable: the provider stays empty
        let first = reconciler.start(vec![bob()].into());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.session, first);

        // Let the first session finish one read and park on its timer
        tokio::time::sleep(Duration::from_secs(1)).await;
        let reads_before = provider.read_count();
        assert_eq!(reads_before, 1);

        let second = reconciler.start(SubscriberSet::new());
        assert!(second > first);

        let events = collect_until_terminal(&mut rx, second).await;
        assert_eq!(
            events.last().unwrap().kind,
            SyncEventKind::Synced { attempts: 1 }
        );
        assert!(events.iter().all(|e| e.session == second));

        // The first session's timer is gone: no further reads ever happen
        tokio::time::sleep(INTERVAL * 30).await;
        assert_eq!(provider.read_count(), reads_before + 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let provider = Arc::new(MemoryProvider::new().frozen());
        provider.upsert(&bob()).await.unwrap();

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(20, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        reconciler.start(vec![bob()].into());
        rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        reconciler.cancel();
        assert!(!reconciler.is_running());

        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(provider.read_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_polls_after_slow_write() {
        let provider = Arc::new(MemoryProvider::new().with_write_delay(Duration::from_secs(25)));

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(20, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        let start = tokio::time::Instant::now();
        let session = reconciler.start_after_write(Mutation::Upsert(bob()), vec![bob()].into());
        assert!(reconciler.is_running());

        // Nothing is read while the write is still out
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(provider.read_count(), 0);
        assert!(rx.try_recv().is_err());

        let events = collect_until_terminal(&mut rx, session).await;
        assert_eq!(
            events.last().unwrap().kind,
            SyncEventKind::Synced { attempts: 1 }
        );
        assert!(provider.read_times()[0] - start >= Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_reported_before_polling() {
        let provider = Arc::new(MemoryProvider::new());
        provider.fail_writes(true);

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(2, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        let session = reconciler.start_after_write(Mutation::Upsert(bob()), vec![bob()].into());
        let events = collect_until_terminal(&mut rx, session).await;

        assert!(matches!(events[0].kind, SyncEventKind::WriteFailed { .. }));
        assert_eq!(
            events[0].status_message().as_deref(),
            Some("Could not save bob@x.com to the list, it may not appear.")
        );
        assert!(matches!(
            events[1].kind,
            SyncEventKind::AttemptStarted { attempt: 1, .. }
        ));
        assert_eq!(
            events.last().unwrap().kind,
            SyncEventKind::Exhausted { attempts: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_session_keeps_its_write() {
        let provider = Arc::new(MemoryProvider::new().with_write_delay(Duration::from_secs(25)));
        let ann = Subscriber::new("Ann", "ann@x.com");

        let mut reconciler = Reconciler::new(provider.clone(), SyncPolicy::new(20, INTERVAL));
        let mut rx = reconciler.take_events().unwrap();

        reconciler.start_after_write(Mutation::Upsert(ann.clone()), vec![ann.clone()].into());
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = reconciler.start_after_write(
            Mutation::Upsert(bob()),
            vec![ann.clone(), bob()].into(),
        );

        let events = collect_until_terminal(&mut rx, second).await;
        assert!(events.iter().all(|e| e.session == second));
        assert_eq!(
            events.last().unwrap().kind,
            SyncEventKind::Synced { attempts: 1 }
        );
        assert_eq!(provider.upserts(), vec![ann, bob()]);
    }

    #[test]
    fn test_event_helpers() {
        let event = SyncEvent {
            session: SessionId::new(1),
            kind: SyncEventKind::ReadFailed {
                attempt: 1,
                error: "503".to_string(),
            },
        };
        assert!(event.phase().is_none());
        assert!(event.status_message().is_none());
        assert!(!event.is_terminal());

        let event = SyncEvent {
            session: SessionId::new(1),
            kind: SyncEventKind::WriteFailed {
                mutation: Mutation::Remove {
                    email: "ghost@x.com".to_string(),
                },
                error: "404".to_string(),
            },
        };
        assert!(event.phase().is_none());
        assert_eq!(
            event.status_message().as_deref(),
            Some("Tried to remove ghost@x.com, but it may already be deleted.")
        );
        assert!(!event.is_terminal());

        let event = SyncEvent {
            session: SessionId::new(1),
            kind: SyncEventKind::Exhausted { attempts: 4 },
        };
        assert_eq!(event.phase(), Some(SyncPhase::Exhausted { attempts: 4 }));
        assert!(event.is_terminal());
    }
}
