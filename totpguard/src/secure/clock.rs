use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time for step and audit timestamps.
pub trait Clock: Send + Sync {
    fn unix_millis(&self) -> i64;

    fn unix_seconds(&self) -> i64 {
        self.unix_millis().div_euclid(1000)
    }
}

pub(crate) fn system_unix_seconds() -> i64 {
    SystemClock.unix_seconds()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn at_seconds(unix_seconds: i64) -> Self {
        Self {
            millis: AtomicI64::new(unix_seconds * 1000),
        }
    }

    pub fn set_seconds(&self, unix_seconds: i64) {
        self.millis.store(unix_seconds * 1000, Ordering::SeqCst);
    }

    pub fn advance_seconds(&self, seconds: i64) {
        self.millis.fetch_add(seconds * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
