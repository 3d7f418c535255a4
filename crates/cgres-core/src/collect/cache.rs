//! Per-metric result cache (§3 `MetricCache`, §4.G caching).
//!
//! A cache is a single `(value, expires_at)` slot behind a mutex. On a hit
//! within the TTL it returns the stored value without touching the
//! filesystem; on a miss it recomputes, stores, and returns. Concurrent
//! racing callers may both observe a miss and both recompute — that is
//! fine, because every metric computation is idempotent and side-effect
//! free, so a lost update just means the next miss reads the file again.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default TTL (§3): 20 ms wall time. Overridable via `CGRES_CACHE_TTL_MS`
/// so fixture-driven tests can observe expiry without a real sleep.
pub fn default_ttl() -> Duration {
    match std::env::var("CGRES_CACHE_TTL_MS") {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => Duration::from_millis(20),
        },
        Err(_) => Duration::from_millis(20),
    }
}

pub struct MetricCache<T: Clone> {
    ttl: Duration,
    slot: Mutex<Option<(T, Instant)>>,
}

impl<T: Clone> MetricCache<T> {
    pub fn new(ttl: Duration) -> Self {
        MetricCache {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value if still fresh; otherwise call `compute`,
    /// cache its result (including "negative" results like `Unlimited` /
    /// `Unavailable`), and return it.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> T) -> T {
        let now = Instant::now();
        if let Some((value, expires_at)) = self.slot.lock().unwrap().as_ref() {
            if now < *expires_at {
                return value.clone();
            }
        }

        let value = compute();
        *self.slot.lock().unwrap() = Some((value.clone(), now + self.ttl));
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn hit_within_ttl_avoids_recompute() {
        let cache = MetricCache::new(Duration::from_millis(50));
        let calls = AtomicU32::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            42
        };

        assert_eq!(cache.get_or_compute(compute), 42);
        assert_eq!(cache.get_or_compute(compute), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn miss_after_ttl_recomputes() {
        let cache = MetricCache::new(Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            calls.load(Ordering::SeqCst)
        };

        assert_eq!(cache.get_or_compute(compute), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get_or_compute(compute), 2);
    }
}
