//! Per-repository sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default trailing window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Admits at most `limit` events per key within a trailing `window`.
///
/// Each key holds the instants of its recent admissions. Every check prunes
/// instants that have left the window before counting, so a bucket never
/// holds more than `limit` entries. Buckets are never removed; the map grows
/// with distinct repositories only.
#[derive(Debug)]
pub struct RepoRateLimiter {
    buckets: Mutex<HashMap<String, VecDeque<Instant>>>,
    limit: usize,
    window: Duration,
}

impl RepoRateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// A limiter with the default one-minute window.
    pub fn per_minute(limit: usize) -> Self {
        Self::new(limit, DEFAULT_WINDOW)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an admission for `key` if it is under its limit.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let bucket = buckets.entry(key.to_string()).or_default();

        while let Some(oldest) = bucket.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() >= self.limit {
            return false;
        }

        bucket.push_back(now);
        true
    }

    /// Admissions currently counted against `key`, without pruning.
    pub fn recorded(&self, key: &str) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .map_or(0, VecDeque::len)
    }
}
