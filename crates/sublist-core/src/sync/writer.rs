//! Background provider writes
//!
//! Writes run on a single task, one at a time and in commit order. A
//! superseded session never cancels a write: the session that follows a
//! write only waits on a completion signal, and aborting it drops the signal
//! while the write carries on.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::reconciler::{SyncEvent, SyncEventKind};
use super::session::SessionId;
use crate::models::Subscriber;
use crate::provider::{ListProvider, ProviderResult};

/// A write that has been applied locally but not yet sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create or update a subscriber
    Upsert(Subscriber),
    /// Delete the subscriber with this email
    Remove { email: String },
}

impl Mutation {
    pub fn email(&self) -> &str {
        match self {
            Mutation::Upsert(subscriber) => &subscriber.email,
            Mutation::Remove { email } => email,
        }
    }

    async fn send(&self, provider: &dyn ListProvider) -> ProviderResult<()> {
        match self {
            Mutation::Upsert(subscriber) => {
                let response = provider.upsert(subscriber).await?;
                debug!("Saved {}: {}", subscriber.email, response);
                Ok(())
            }
            Mutation::Remove { email } => {
                provider.remove(email).await?;
                debug!("Removed {}", email);
                Ok(())
            }
        }
    }
}

struct WriteJob {
    session: SessionId,
    mutation: Mutation,
    done: oneshot::Sender<()>,
}

/// Queue feeding the write task
pub(crate) struct Writer {
    jobs: mpsc::UnboundedSender<WriteJob>,
    _task: JoinHandle<()>,
}

impl Writer {
    /// Spawn the write task
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        provider: Arc<dyn ListProvider>,
        events: mpsc::UnboundedSender<SyncEvent>,
    ) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        Self {
            jobs,
            _task: tokio::spawn(run_writer(provider, rx, events)),
        }
    }

    /// Queue `mutation`, returning a signal that fires once it has been sent
    ///
    /// Failures are reported as [`SyncEventKind::WriteFailed`] before the
    /// signal fires.
    pub(crate) fn submit(&self, session: SessionId, mutation: Mutation) -> oneshot::Receiver<()> {
        let (done, written) = oneshot::channel();
        let job = WriteJob {
            session,
            mutation,
            done,
        };
        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            warn!("Write task is gone, dropping write for {}", job.mutation.email());
        }
        written
    }
}

async fn run_writer(
    provider: Arc<dyn ListProvider>,
    mut jobs: mpsc::UnboundedReceiver<WriteJob>,
    events: mpsc::UnboundedSender<SyncEvent>,
) {
    while let Some(job) = jobs.recv().await {
        let result = job.mutation.send(provider.as_ref()).await;
        if let Err(e) = result {
            warn!("Write for {} failed: {}", job.mutation.email(), e);
            let _ = events.send(SyncEvent {
                session: job.session,
                kind: SyncEventKind::WriteFailed {
                    mutation: job.mutation,
                    error: e.to_string(),
                },
            });
        }
        let _ = job.done.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::provider::MemoryProvider;

    fn ann() -> Mutation {
        Mutation::Upsert(Subscriber::new("Ann", "ann@x.com"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_go_out_in_order() {
        let provider = Arc::new(MemoryProvider::new().with_write_delay(Duration::from_secs(5)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let writer = Writer::spawn(provider.clone(), tx);

        let first = writer.submit(SessionId::new(1), ann());
        let second = writer.submit(
            SessionId::new(2),
            Mutation::Remove {
                email: "ann@x.com".to_string(),
            },
        );

        first.await.unwrap();
        assert_eq!(provider.upserts().len(), 1);
        assert!(provider.removes().is_empty());

        second.await.unwrap();
        assert_eq!(provider.removes(), vec!["ann@x.com".to_string()]);
        assert!(provider.snapshot().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failure_reported_before_done() {
        let provider = Arc::new(MemoryProvider::new());
        provider.fail_writes(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let writer = Writer::spawn(provider.clone(), tx);

        writer.submit(SessionId::new(7), ann()).await.unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session, SessionId::new(7));
        assert!(matches!(
            event.kind,
            SyncEventKind::WriteFailed { ref mutation, .. } if *mutation == ann()
        ));
    }

    #[test]
    fn test_mutation_email() {
        assert_eq!(ann().email(), "ann@x.com");
        let remove = Mutation::Remove {
            email: "bob@x.com".to_string(),
        };
        assert_eq!(remove.email(), "bob@x.com");
    }
}
