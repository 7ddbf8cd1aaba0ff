//! Per-record exponential backoff.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use common::RecordId;
use tokio::time::Instant;

/// Retry policy: decides how long a record waits between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per additional failed attempt.
    pub multiplier: f64,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay before the next attempt, given the number of
    /// failed attempts so far (1-indexed).
    ///
    /// With base 2s and multiplier 2.0: attempt 1 waits 2s, attempt 2 waits
    /// 4s, attempt 3 waits 8s, capped at `max_delay`.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31) as i32;
        let delay = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

#[derive(Debug, Clone, Copy)]
struct BackoffEntry {
    attempts: u32,
    eligible_at: Instant,
}

/// Tracks per-record retry state so a persistently failing destination is
/// not hot-looped.
///
/// Workers share one tracker; entries for records that reach a terminal
/// status are cleared to keep the map bounded by the in-flight set.
#[derive(Debug)]
pub(crate) struct BackoffTracker {
    policy: RetryPolicy,
    entries: Mutex<HashMap<RecordId, BackoffEntry>>,
}

impl BackoffTracker {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failed attempt and returns the delay before the record
    /// becomes eligible again.
    pub(crate) fn note_failure(&self, id: RecordId) -> Duration {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(id).or_insert(BackoffEntry {
            attempts: 0,
            eligible_at: Instant::now(),
        });
        entry.attempts += 1;
        let delay = self.policy.delay_for(entry.attempts);
        entry.eligible_at = Instant::now() + delay;
        delay
    }

    /// Returns true if the record may be attempted now.
    pub(crate) fn is_eligible(&self, id: RecordId) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(&id)
            .is_none_or(|entry| entry.eligible_at <= Instant::now())
    }

    /// Forgets a record's retry state (on terminal status).
    pub(crate) fn clear(&self, id: RecordId) {
        self.entries.lock().unwrap().remove(&id);
    }
}
