use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of the current time. Injected wherever a decision depends on wall-clock time so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self { time: Arc::new(Mutex::new(time)) }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        let mut guard = self.time.lock().unwrap_or_else(|e| e.into_inner());
        *guard = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.time.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(|e| e.into_inner())
    }
}
