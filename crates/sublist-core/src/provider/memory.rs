//! In-process list provider
//!
//! Behaves like the remote list, including its eventual consistency: a write
//! becomes visible only after a configurable number of reads. Used for tests
//! and for exercising the sync loop without network access.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::error::{ProviderError, ProviderResult};
use super::ListProvider;
use crate::models::{Subscriber, SubscriberSet};

#[derive(Debug, Clone)]
enum Write {
    Upsert(Subscriber),
    Remove(String),
}

#[derive(Debug, Clone)]
struct PendingWrite {
    /// Reads that still see the old state
    reads_remaining: u32,
    write: Write,
}

#[derive(Debug, Default)]
struct Inner {
    visible: SubscriberSet,
    pending: Vec<PendingWrite>,
    visibility_lag: u32,
    frozen: bool,
    failing_reads: u32,
    fail_writes: bool,
    write_delay: Option<Duration>,
    removes_need_visibility: bool,
    read_times: Vec<Instant>,
    upserts: Vec<Subscriber>,
    removes: Vec<String>,
}

impl Inner {
    fn apply(&mut self, write: Write) {
        match write {
            Write::Upsert(subscriber) => self.visible.upsert(subscriber),
            Write::Remove(email) => {
                self.visible.remove(&email);
            }
        }
    }

    /// Make due writes visible and age the rest
    fn settle(&mut self) {
        if self.frozen {
            return;
        }

        let pending = std::mem::take(&mut self.pending);
        for mut entry in pending {
            if entry.reads_remaining == 0 {
                self.apply(entry.write);
            } else {
                entry.reads_remaining -= 1;
                self.pending.push(entry);
            }
        }
    }

    fn knows_email(&self, email: &str) -> bool {
        if self.removes_need_visibility {
            return self.visible.contains_email(email);
        }
        self.visible.contains_email(email)
            || self
                .pending
                .iter()
                .any(|p| matches!(&p.write, Write::Upsert(s) if s.email == email))
    }
}

/// In-memory [`ListProvider`]
#[derive(Debug, Default)]
pub struct MemoryProvider {
    inner: Mutex<Inner>,
}

impl MemoryProvider {
    /// Create an empty, immediately consistent provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that already holds `subscribers`
    pub fn with_subscribers(subscribers: SubscriberSet) -> Self {
        let provider = Self::new();
        provider.lock().visible = subscribers;
        provider
    }

    /// Number of reads that keep seeing the old state after each write
    pub fn with_visibility_lag(self, reads: u32) -> Self {
        self.lock().visibility_lag = reads;
        self
    }

    /// Accept writes but never make them visible
    pub fn frozen(self) -> Self {
        self.lock().frozen = true;
        self
    }

    /// Make every write take `delay` before it is accepted
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.lock().write_delay = Some(delay);
        self
    }

    /// Reject deletes of records whose create is not visible yet
    ///
    /// Models a delete that reaches the remote list ahead of the create.
    pub fn with_removes_needing_visibility(self) -> Self {
        self.lock().removes_need_visibility = true;
        self
    }

    /// Fail the next `count` reads with HTTP 503
    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    /// Make every write fail with HTTP 500
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of reads served so far, including failed ones
    pub fn read_count(&self) -> usize {
        self.lock().read_times.len()
    }

    /// When each read was served
    pub fn read_times(&self) -> Vec<Instant> {
        self.lock().read_times.clone()
    }

    /// Every upsert received, in order
    pub fn upserts(&self) -> Vec<Subscriber> {
        self.lock().upserts.clone()
    }

    /// Every remove received, in order
    pub fn removes(&self) -> Vec<String> {
        self.lock().removes.clone()
    }

    /// The subscribers a read would currently return, without counting as a read
    pub fn snapshot(&self) -> SubscriberSet {
        self.lock().visible.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-call; the data is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn delay_write(&self) {
        let delay = self.lock().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn record_write(&self, write: Write) {
        let mut inner = self.lock();
        if inner.visibility_lag == 0 && !inner.frozen {
            inner.apply(write);
        } else {
            let reads_remaining = inner.visibility_lag;
            inner.pending.push(PendingWrite {
                reads_remaining,
                write,
            });
        }
    }
}

#[async_trait]
impl ListProvider for MemoryProvider {
    async fn list_active(&self) -> ProviderResult<SubscriberSet> {
        let mut inner = self.lock();
        inner.read_times.push(Instant::now());

        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(ProviderError::Status {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }

        inner.settle();
        Ok(inner.visible.clone())
    }

    async fn upsert(&self, subscriber: &Subscriber) -> ProviderResult<serde_json::Value> {
        self.delay_write().await;
        {
            let mut inner = self.lock();
            inner.upserts.push(subscriber.clone());
            if inner.fail_writes {
                return Err(ProviderError::Status {
                    status: 500,
                    body: "Internal Server Error".to_string(),
                });
            }
        }

        self.record_write(Write::Upsert(subscriber.clone()));
        Ok(serde_json::Value::String(subscriber.email.clone()))
    }

    async fn remove(&self, email: &str) -> ProviderResult<()> {
        self.delay_write().await;
        {
            let mut inner = self.lock();
            inner.removes.push(email.to_string());
            if inner.fail_writes {
                return Err(ProviderError::Status {
                    status: 500,
                    body: "Internal Server Error".to_string(),
                });
            }
            if !inner.knows_email(email) {
                return Err(ProviderError::Status {
                    status: 404,
                    body: "Subscriber not in list".to_string(),
                });
            }
        }

        self.record_write(Write::Remove(email.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediately_consistent_by_default() {
        let provider = MemoryProvider::new();
        provider
            .upsert(&Subscriber::new("Ann", "ann@x.com"))
            .await
            .unwrap();

        let subs = provider.list_active().await.unwrap();
        assert!(subs.contains_email("ann@x.com"));
    }

    #[tokio::test]
    async fn test_visibility_lag() {
        let provider = MemoryProvider::new().with_visibility_lag(2);
        provider
            .upsert(&Subscriber::new("Ann", "ann@x.com"))
            .await
            .unwrap();

        assert!(provider.list_active().await.unwrap().is_empty());
        assert!(provider.list_active().await.unwrap().is_empty());
        assert_eq!(provider.list_active().await.unwrap().len(), 1);
        assert_eq!(provider.read_count(), 3);
    }

    #[tokio::test]
    async fn test_frozen_never_applies() {
        let provider = MemoryProvider::new().frozen();
        provider
            .upsert(&Subscriber::new("Ann", "ann@x.com"))
            .await
            .unwrap();

        for _ in 0..5 {
            assert!(provider.list_active().await.unwrap().is_empty());
        }
        assert_eq!(provider.upserts().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_is_not_found() {
        let provider = MemoryProvider::new();
        let err = provider.remove("ghost@x.com").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(provider.removes(), vec!["ghost@x.com".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_of_pending_add_is_accepted() {
        let provider = MemoryProvider::new().with_visibility_lag(1);
        provider
            .upsert(&Subscriber::new("Ann", "ann@x.com"))
            .await
            .unwrap();
        provider.remove("ann@x.com").await.unwrap();

        // Both writes surface together and cancel out
        provider.list_active().await.unwrap();
        assert!(provider.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_ahead_of_create_is_not_found() {
        let provider = MemoryProvider::new()
            .with_visibility_lag(1)
            .with_removes_needing_visibility();
        provider
            .upsert(&Subscriber::new("Ann", "ann@x.com"))
            .await
            .unwrap();

        let err = provider.remove("ann@x.com").await.unwrap_err();
        assert!(err.is_not_found());

        // The create still lands
        provider.list_active().await.unwrap();
        assert!(provider.list_active().await.unwrap().contains_email("ann@x.com"));
    }

    #[tokio::test]
    async fn test_failing_reads() {
        let provider =
            MemoryProvider::with_subscribers(vec![Subscriber::new("Ann", "ann@x.com")].into());
        provider.fail_next_reads(1);

        assert!(provider.list_active().await.is_err());
        assert_eq!(provider.list_active().await.unwrap().len(), 1);
        assert_eq!(provider.read_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_delay() {
        let provider = MemoryProvider::new().with_write_delay(Duration::from_secs(25));
        let start = Instant::now();
        provider
            .upsert(&Subscriber::new("Ann", "ann@x.com"))
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(25));
        assert_eq!(provider.upserts().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_writes_are_recorded() {
        let provider = MemoryProvider::new();
        provider.fail_writes(true);

        let err = provider
            .upsert(&Subscriber::new("Ann", "ann@x.com"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(provider.upserts().len(), 1);
        assert!(provider.snapshot().is_empty());
    }
}
