//! Reconciliation session state machine
//!
//! `Idle -> Polling -> {Synced | Exhausted}`. The machine itself does no I/O:
//! the caller starts an attempt, performs the read, and hands the observed
//! set (or `None` for a failed read) back for evaluation. [`SyncPhase::Writing`]
//! is never entered by the machine; the store reports it between a commit
//! and the session's first attempt.

use std::fmt;
use std::time::Duration;

use crate::config::Config;
use crate::models::SubscriberSet;

/// Identifies one reconciliation session
///
/// Ids increase monotonically; a larger id always belongs to a newer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How long and how often a session polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Reads before giving up, at least 1
    pub max_attempts: u32,
    /// Delay between reads
    pub interval: Duration,
}

impl SyncPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_attempts, config.poll_interval())
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::new(20, Duration::from_secs(12))
    }
}

/// Where the current session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No session has run yet
    Idle,
    /// A session is waiting for its write to go out
    Writing,
    /// Attempt `attempt` of `max_attempts` is in progress
    Polling { attempt: u32, max_attempts: u32 },
    /// Provider matched after `attempts` reads
    Synced { attempts: u32 },
    /// Gave up after `attempts` reads
    Exhausted { attempts: u32 },
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Synced { .. } | SyncPhase::Exhausted { .. })
    }
}

/// Result of evaluating one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Observed matches expected; stop
    Synced,
    /// No match and no attempts left; stop
    Exhausted,
    /// No match; wait one interval and try again
    Retry,
}

/// A single reconciliation session
#[derive(Debug, Clone)]
pub struct ReconcileSession {
    id: SessionId,
    expected: SubscriberSet,
    policy: SyncPolicy,
    attempt: u32,
    phase: SyncPhase,
}

impl ReconcileSession {
    pub fn new(id: SessionId, expected: SubscriberSet, policy: SyncPolicy) -> Self {
        Self {
            id,
            expected,
            policy,
            attempt: 0,
            phase: SyncPhase::Idle,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn expected(&self) -> &SubscriberSet {
        &self.expected
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Start the next attempt and return its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        debug_assert!(!self.phase.is_terminal(), "session already finished");
        self.attempt += 1;
        self.phase = SyncPhase::Polling {
            attempt: self.attempt,
            max_attempts: self.policy.max_attempts,
        };
        self.attempt
    }

    /// Evaluate the read for the current attempt
    ///
    /// `None` means the read failed; it still uses up the attempt.
    pub fn evaluate(&mut self, observed: Option<&SubscriberSet>) -> AttemptOutcome {
        let matched = observed.is_some_and(|observed| self.expected.matches(observed));

        if matched {
            self.phase = SyncPhase::Synced {
                attempts: self.attempt,
            };
            AttemptOutcome::Synced
        } else if self.attempt >= self.policy.max_attempts {
            self.phase = SyncPhase::Exhausted {
                attempts: self.attempt,
            };
            AttemptOutcome::Exhausted
        } else {
            AttemptOutcome::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Subscriber;

    fn bob() -> SubscriberSet {
        vec![Subscriber::new("Bob", "bob@x.com")].into()
    }

    fn session(max_attempts: u32) -> ReconcileSession {
        ReconcileSession::new(
            SessionId::new(1),
            bob(),
            SyncPolicy::new(max_attempts, Duration::from_secs(12)),
        )
    }

    #[test]
    fn test_starts_idle() {
        let s = session(3);
        assert_eq!(s.phase(), SyncPhase::Idle);
        assert_eq!(s.attempt(), 0);
    }

    #[test]
    fn test_synced_on_third_attempt() {
        let mut s = session(20);
        let empty = SubscriberSet::new();

        assert_eq!(s.begin_attempt(), 1);
        assert_eq!(s.evaluate(Some(&empty)), AttemptOutcome::Retry);
        assert_eq!(s.begin_attempt(), 2);
        assert_eq!(s.evaluate(Some(&empty)), AttemptOutcome::Retry);
        assert_eq!(
            s.phase(),
            SyncPhase::Polling {
                attempt: 2,
                max_attempts: 20
            }
        );
        assert_eq!(s.begin_attempt(), 3);
        assert_eq!(s.evaluate(Some(&bob())), AttemptOutcome::Synced);
        assert_eq!(s.phase(), SyncPhase::Synced { attempts: 3 });
        assert!(s.phase().is_terminal());
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let mut s = session(3);
        let empty = SubscriberSet::new();

        for _ in 0..2 {
            s.begin_attempt();
            assert_eq!(s.evaluate(Some(&empty)), AttemptOutcome::Retry);
        }
        s.begin_attempt();
        assert_eq!(s.evaluate(Some(&empty)), AttemptOutcome::Exhausted);
        assert_eq!(s.phase(), SyncPhase::Exhausted { attempts: 3 });
    }

    #[test]
    fn test_failed_read_uses_an_attempt() {
        let mut s = session(2);

        s.begin_attempt();
        assert_eq!(s.evaluate(None), AttemptOutcome::Retry);
        s.begin_attempt();
        assert_eq!(s.evaluate(None), AttemptOutcome::Exhausted);
    }

    #[test]
    fn test_match_on_last_attempt_wins_over_exhaustion() {
        let mut s = session(1);
        s.begin_attempt();
        assert_eq!(s.evaluate(Some(&bob())), AttemptOutcome::Synced);
    }

    #[test]
    fn test_policy_clamps_zero_attempts() {
        let policy = SyncPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = Config::default();
        config.max_attempts = 10;
        config.poll_interval_secs = 4;
        let policy = SyncPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.interval, Duration::from_secs(4));
    }

    #[test]
    fn test_session_ids_order() {
        assert!(SessionId::new(2) > SessionId::new(1));
        assert_eq!(SessionId::new(7).to_string(), "#7");
    }
}
