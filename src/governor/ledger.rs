//! Sliding-window call history.
//!
//! The ledger is an ordered list of call timestamps pruned to the last
//! hour. It only *reports* whether another call fits under the per-minute
//! and per-hour ceilings; denying the call is the governor's job. Bursts up
//! to a ceiling are legal; there is no smooth refill.
//!
//! History is in-memory only: restarting the process resets the quota.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::config::RateLimitConfig;
use crate::clock::Clock;

const MINUTE_MILLIS: u64 = 60_000;
const HOUR_MILLIS: u64 = 3_600_000;

/// Call counts within the trailing windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerUsage {
    pub last_minute: u32,
    pub last_hour: u32,
}

/// Sliding-window call counter.
#[derive(Debug)]
pub struct CallLedger {
    max_per_minute: u32,
    max_per_hour: u32,
    clock: Arc<dyn Clock>,
    entries: Mutex<VecDeque<u64>>,
}

impl CallLedger {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_per_minute: config.max_calls_per_minute,
            max_per_hour: config.max_calls_per_hour,
            clock,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Whether another call fits under both ceilings right now.
    pub fn can_make_call(&self) -> bool {
        let usage = self.usage();
        usage.last_minute < self.max_per_minute && usage.last_hour < self.max_per_hour
    }

    /// Record a call at the current time.
    pub fn record_call(&self) {
        let now = self.clock.now_millis();
        self.lock().push_back(now);
    }

    /// Counts of recorded calls in the trailing minute and hour.
    pub fn usage(&self) -> LedgerUsage {
        let now = self.clock.now_millis();
        let mut entries = self.lock();
        prune(&mut entries, now);
        let minute_start = now.saturating_sub(MINUTE_MILLIS);
        LedgerUsage {
            last_minute: count(entries.iter().filter(|&&t| t > minute_start)),
            last_hour: count(entries.iter()),
        }
    }

    /// Time until the next call would be admitted, or `None` if one is
    /// admitted now.
    pub fn retry_after(&self) -> Option<Duration> {
        let now = self.clock.now_millis();
        let mut entries = self.lock();
        prune(&mut entries, now);

        let mut wait = 0u64;
        let minute_start = now.saturating_sub(MINUTE_MILLIS);
        let in_minute: Vec<u64> = entries
            .iter()
            .copied()
            .filter(|&t| t > minute_start)
            .collect();
        if let Some(&t) = over_ceiling(&in_minute, self.max_per_minute) {
            wait = wait.max(t + MINUTE_MILLIS - now);
        }
        let in_hour: Vec<u64> = entries.iter().copied().collect();
        if let Some(&t) = over_ceiling(&in_hour, self.max_per_hour) {
            wait = wait.max(t + HOUR_MILLIS - now);
        }
        (wait > 0).then(|| Duration::from_millis(wait))
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop entries at least an hour old.
fn prune(entries: &mut VecDeque<u64>, now: u64) {
    let hour_start = now.saturating_sub(HOUR_MILLIS);
    while entries.front().is_some_and(|&t| t <= hour_start) {
        entries.pop_front();
    }
}

fn count<'a>(iter: impl Iterator<Item = &'a u64>) -> u32 {
    u32::try_from(iter.count()).unwrap_or(u32::MAX)
}

/// The entry whose expiry brings `window` back under `ceiling`, if it is
/// at or above the ceiling.
fn over_ceiling(window: &[u64], ceiling: u32) -> Option<&u64> {
    let ceiling = ceiling as usize;
    if window.len() < ceiling {
        return None;
    }
    // Sorted ascending; dropping the oldest `len - ceiling + 1` frees a slot.
    window.get(window.len() - ceiling)
}
