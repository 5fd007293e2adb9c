//! Per-requester sliding window limiter.

use dashmap::DashMap;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    requests: DashMap<u64, Vec<Instant>>,
    max_requests: usize,
    time_window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            time_window,
        }
    }

    /// Records an invocation for `key`, or returns how long until the oldest
    /// invocation in the window expires.
    pub fn check(&self, key: u64) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: u64, now: Instant) -> Result<(), Duration> {
        self.prune(now);
        let mut entry = self.requests.entry(key).or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            let oldest = entry.first().copied().unwrap_or(now);
            Err(self.time_window.saturating_sub(now.duration_since(oldest)))
        } else {
            entry.push(now);
            Ok(())
        }
    }

    /// Drops requesters with nothing left in their window.
    fn prune(&self, now: Instant) {
        self.requests.retain(|_, times| {
            times
                .last()
                .is_some_and(|&time| now.duration_since(time) < self.time_window)
        });
    }
}
