use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::bounded;
use crate::error::StoreError;
use crate::secure::Clock;
use crate::store::{AttemptStore, ValidationAttempt};

type AttemptKey = (String, i64);

/// Counts failed validation attempts per identity and time step.
///
/// Callers hold the [`AttemptPermit`] for a key across count, compare and record, so concurrent
/// validations of the same identity within one step cannot overshoot `max_attempts`.
pub struct AttemptLimiter {
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    timeout: Duration,
    locks: DashMap<AttemptKey, Arc<Mutex<()>>>,
}

pub struct AttemptPermit<'a> {
    limiter: &'a AttemptLimiter,
    key: AttemptKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AttemptPermit<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.limiter
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl AttemptLimiter {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            max_attempts,
            timeout,
            locks: DashMap::new(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Waits until no other caller is working on `(identity, step)`.
    pub async fn acquire(&self, identity: &str, step: i64) -> AttemptPermit<'_> {
        let key = (identity.to_owned(), step);
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;

        AttemptPermit {
            limiter: self,
            key,
            guard: Some(guard),
        }
    }

    pub async fn count_failed_attempts(&self, identity: &str, step: i64) -> Result<u32, StoreError> {
        bounded(self.timeout, self.store.count_failed(identity, step)).await
    }

    /// True once `count` has reached the configured maximum.
    pub fn is_exhausted(&self, count: u32) -> bool {
        count >= self.max_attempts
    }

    pub async fn record_attempt(
        &self,
        identity: &str,
        step: i64,
        account_enabled: bool,
        succeeded: bool,
    ) -> Result<(), StoreError> {
        let attempt = ValidationAttempt {
            id: Uuid::new_v4(),
            accessed_at: self.clock.unix_millis(),
            step,
            identity: identity.to_owned(),
            account_enabled,
            succeeded,
        };
        bounded(self.timeout, self.store.append(attempt)).await
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure::ManualClock;
    use crate::store::MemoryStore;

    fn limiter(store: Arc<MemoryStore>) -> AttemptLimiter {
        AttemptLimiter::new(
            store,
            Arc::new(ManualClock::at_seconds(1_700_000_000)),
            3,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn counts_recorded_failures() {
        let limiter = limiter(Arc::new(MemoryStore::new()));
        for _ in 0..3 {
            limiter.record_attempt("alice", 7, true, false).await.unwrap();
        }
        limiter.record_attempt("alice", 7, true, true).await.unwrap();

        let count = limiter.count_failed_attempts("alice", 7).await.unwrap();
        assert_eq!(count, 3);
        assert!(limiter.is_exhausted(count));
        assert!(!limiter.is_exhausted(limiter.count_failed_attempts("alice", 8).await.unwrap()));
    }

    #[tokio::test]
    async fn records_carry_clock_time() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store.clone());
        limiter.record_attempt("alice", 7, false, false).await.unwrap();

        let recorded = store.recent(None).await.unwrap();
        assert_eq!(recorded[0].accessed_at, 1_700_000_000_000);
        assert!(!recorded[0].account_enabled);
    }

    #[tokio::test]
    async fn permits_are_released_and_pruned() {
        let limiter = limiter(Arc::new(MemoryStore::new()));
        {
            let _permit = limiter.acquire("alice", 7).await;
            assert_eq!(limiter.tracked_keys(), 1);
        }
        assert_eq!(limiter.tracked_keys(), 0);

        let _again = limiter.acquire("alice", 7).await;
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let limiter = limiter(Arc::new(MemoryStore::new()));
        let permit = limiter.acquire("alice", 7).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), limiter.acquire("alice", 7)).await;
        assert!(blocked.is_err());

        let other = tokio::time::timeout(Duration::from_millis(50), limiter.acquire("bob", 7)).await;
        assert!(other.is_ok());
        drop(permit);
    }
}
