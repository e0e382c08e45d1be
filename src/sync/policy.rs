use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of "now" for staleness checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// How long a snapshot may be served before it must be refetched
#[derive(Clone)]
pub struct StalenessPolicy {
    threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl StalenessPolicy {
    pub fn new(threshold: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { threshold, clock }
    }

    pub fn system(threshold: Duration) -> Self {
        Self::new(threshold, Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// True when `fetched_at` is younger than the threshold.
    /// A timestamp in the future (clock moved backwards) counts as fresh.
    pub fn is_fresh(&self, fetched_at: Option<DateTime<Utc>>) -> bool {
        let Some(fetched_at) = fetched_at else {
            return false;
        };
        let age = self.now().signed_duration_since(fetched_at);
        match age.to_std() {
            Ok(age) => age < self.threshold,
            Err(_) => true,
        }
    }
}

impl std::fmt::Debug for StalenessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StalenessPolicy")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}
