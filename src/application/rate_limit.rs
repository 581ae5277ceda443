//! Fixed-window request limiter keyed by caller identifier.
//!
//! Windows live in a bounded LRU store split into independently locked shards.
//! Calls for the same identifier always land on the same shard and are
//! serialized by its mutex; different identifiers usually do not contend.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::warn;

const DEFAULT_SHARDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    pub window: Duration,
    /// Maximum tracked identifiers across all shards.
    pub capacity: NonZeroUsize,
    pub shards: NonZeroUsize,
}

impl RateLimiterConfig {
    pub fn new(window: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            window,
            capacity,
            shards: NonZeroUsize::new(DEFAULT_SHARDS).unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub fn with_shards(mut self, shards: NonZeroUsize) -> Self {
        self.shards = shards;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateWindowEntry {
    count: u32,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    shards: Vec<Mutex<LruCache<String, RateWindowEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let shard_count = config.shards.get().min(config.capacity.get());
        let per_shard = config.capacity.get().div_ceil(shard_count);
        let per_shard = NonZeroUsize::new(per_shard).unwrap_or(NonZeroUsize::MIN);
        let shards = (0..shard_count)
            .map(|_| Mutex::new(LruCache::new(per_shard)))
            .collect();
        Self {
            window: config.window,
            shards,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whole seconds, rounded up and at least one, until the window of
    /// `identifier` closes.
    pub fn retry_after_secs(&self, identifier: &str) -> u64 {
        self.retry_after_secs_at(identifier, Instant::now())
    }

    pub(crate) fn retry_after_secs_at(&self, identifier: &str, now: Instant) -> u64 {
        let remaining = self
            .lock_shard(identifier)
            .peek(identifier)
            .map(|entry| entry.expires_at.saturating_duration_since(now))
            .unwrap_or_default();
        let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        secs.max(1)
    }

    /// Count one request for `identifier`. Returns `false` once `limit`
    /// requests have been allowed in the current window; denied calls do not
    /// increment the counter.
    pub fn check_and_consume(&self, identifier: &str, limit: u32) -> bool {
        self.check_and_consume_at(identifier, limit, Instant::now())
    }

    pub(crate) fn check_and_consume_at(&self, identifier: &str, limit: u32, now: Instant) -> bool {
        if limit == 0 {
            return false;
        }
        let mut shard = self.lock_shard(identifier);

        if let Some(entry) = shard.get_mut(identifier)
            && now < entry.expires_at
        {
            if entry.count < limit {
                entry.count += 1;
                return true;
            }
            return false;
        }

        shard.put(
            identifier.to_string(),
            RateWindowEntry {
                count: 1,
                expires_at: now + self.window,
            },
        );
        true
    }

    /// Forget the window of a single identifier.
    pub fn reset(&self, identifier: &str) {
        self.lock_shard(identifier).pop(identifier);
    }

    /// Forget every tracked window.
    pub fn clear(&self) {
        for shard in &self.shards {
            lock(shard).clear();
        }
    }

    /// Number of identifiers currently tracked, expired windows included.
    pub fn tracked(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    fn lock_shard(&self, identifier: &str) -> MutexGuard<'_, LruCache<String, RateWindowEntry>> {
        let mut hasher = DefaultHasher::new();
        identifier.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        lock(&self.shards[index])
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                target = "application::rate_limit",
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                "Recovered from poisoned rate limit shard"
            );
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn limiter(capacity: usize, shards: usize) -> RateLimiter {
        RateLimiter::new(
            RateLimiterConfig::new(
                Duration::from_secs(60),
                NonZeroUsize::new(capacity).expect("capacity"),
            )
            .with_shards(NonZeroUsize::new(shards).expect("shards")),
        )
    }

    #[test]
    fn denies_after_limit_without_affecting_other_callers() {
        let limiter = limiter(100, 4);
        assert!(limiter.check_and_consume("ip1", 3));
        assert!(limiter.check_and_consume("ip1", 3));
        assert!(limiter.check_and_consume("ip2", 3));
        assert!(limiter.check_and_consume("ip1", 3));
        assert!(!limiter.check_and_consume("ip1", 3));
        assert!(!limiter.check_and_consume("ip1", 3));
        assert!(limiter.check_and_consume("ip2", 3));
    }

    #[test]
    fn window_restarts_after_expiry() {
        let limiter = limiter(100, 1);
        let start = Instant::now();
        assert!(limiter.check_and_consume_at("ip", 1, start));
        assert!(!limiter.check_and_consume_at("ip", 1, start + Duration::from_secs(59)));
        assert!(limiter.check_and_consume_at("ip", 1, start + Duration::from_secs(60)));
        assert!(!limiter.check_and_consume_at("ip", 1, start + Duration::from_secs(61)));
    }

    #[test]
    fn retry_after_counts_down_with_the_window() {
        let limiter = limiter(100, 2);
        let start = Instant::now();
        assert!(limiter.check_and_consume_at("ip", 1, start));
        assert!(!limiter.check_and_consume_at("ip", 1, start));

        assert_eq!(limiter.retry_after_secs_at("ip", start), 60);
        assert_eq!(
            limiter.retry_after_secs_at("ip", start + Duration::from_millis(10)),
            60
        );
        assert_eq!(
            limiter.retry_after_secs_at("ip", start + Duration::from_secs(45)),
            15
        );
        assert_eq!(
            limiter.retry_after_secs_at("ip", start + Duration::from_millis(59_500)),
            1
        );
        assert_eq!(
            limiter.retry_after_secs_at("ip", start + Duration::from_secs(90)),
            1
        );
        assert_eq!(limiter.retry_after_secs_at("unknown", start), 1);
    }

    #[test]
    fn reset_and_clear_forget_windows() {
        let limiter = limiter(100, 4);
        assert!(limiter.check_and_consume("a", 1));
        assert!(limiter.check_and_consume("b", 1));
        assert!(!limiter.check_and_consume("a", 1));

        limiter.reset("a");
        assert!(limiter.check_and_consume("a", 1));
        assert!(!limiter.check_and_consume("b", 1));

        limiter.clear();
        assert_eq!(limiter.tracked(), 0);
        assert!(limiter.check_and_consume("b", 1));
    }

    #[test]
    fn least_recently_used_identifier_is_evicted_at_capacity() {
        let limiter = limiter(2, 1);
        assert!(limiter.check_and_consume("a", 1));
        assert!(limiter.check_and_consume("b", 1));
        assert!(!limiter.check_and_consume("a", 1));
        // `b` is now least recently used and makes room for `c`.
        assert!(limiter.check_and_consume("c", 1));
        assert_eq!(limiter.tracked(), 2);
        assert!(limiter.check_and_consume("b", 1));
        assert!(!limiter.check_and_consume("c", 1));
    }

    #[test]
    fn zero_limit_always_denies() {
        let limiter = limiter(10, 1);
        assert!(!limiter.check_and_consume("ip", 0));
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn concurrent_calls_never_exceed_limit() {
        let limiter = Arc::new(limiter(100, 4));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check_and_consume("shared", 50))
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .sum();
        assert_eq!(allowed, 50);
    }
}
