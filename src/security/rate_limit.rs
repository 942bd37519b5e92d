//! Fixed-window rate limiting keyed by principal+origin.

use dashmap::DashMap;

use crate::security::context::now_millis;

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window (0 when denied).
    pub remaining: u32,
    /// Epoch-ms timestamp at which the window resets.
    pub reset_at_ms: u64,
    /// Whole seconds until the window resets; 0 when allowed.
    pub retry_after_secs: u64,
}

/// Per-key window accounting. Created lazily, reset when the window
/// lapses, swept once stale.
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at_ms: u64,
}

/// Rolling-window request counter.
///
/// One entry per key; window and limit are passed per call so the caller
/// can apply hot-reloaded tunables without reconstructing the limiter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Check `key` against `max` requests per `window_ms`.
    pub fn check(&self, key: &str, window_ms: u64, max: u32) -> RateLimitDecision {
        self.check_at(key, window_ms, max, now_millis())
    }

    /// Deterministic core of [`check`](Self::check), with an explicit clock.
    ///
    /// The count increments up to `max` and rejects once the threshold is
    /// reached, without incrementing further. `max == 0` always denies.
    pub fn check_at(&self, key: &str, window_ms: u64, max: u32, now_ms: u64) -> RateLimitDecision {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_at_ms: now_ms + window_ms,
            });

        // A lapsed window is indistinguishable from a fresh key: every
        // request in a rollover burst observes a clean count.
        if now_ms >= entry.reset_at_ms {
            entry.count = 0;
            entry.reset_at_ms = now_ms + window_ms;
        }

        if entry.count < max {
            entry.count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: max - entry.count,
                reset_at_ms: entry.reset_at_ms,
                retry_after_secs: 0,
            }
        } else {
            let reset_at_ms = entry.reset_at_ms;
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at_ms,
                retry_after_secs: (reset_at_ms.saturating_sub(now_ms) + 999) / 1000,
            }
        }
    }

    /// Drop entries whose window lapsed at least `grace_ms` ago.
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self, now_ms: u64, grace_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.reset_at_ms + grace_ms > now_ms);
        before - self.entries.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 60_000;

    #[test]
    fn test_sixth_request_denied() {
        let limiter = RateLimiter::new();
        let now = 1_000_000;

        for i in 0..5 {
            let d = limiter.check_at("alice|1.2.3.4", WINDOW, 5, now + i);
            assert!(d.allowed, "request {} should be allowed", i + 1);
        }

        let denied = limiter.check_at("alice|1.2.3.4", WINDOW, 5, now + 10);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after_secs, 60);
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let limiter = RateLimiter::new();
        let now = 1_000_000;

        for _ in 0..5 {
            limiter.check_at("k", WINDOW, 5, now);
        }
        assert!(!limiter.check_at("k", WINDOW, 5, now).allowed);

        // First request of the next window sees a fresh count of 1.
        let after = limiter.check_at("k", WINDOW, 5, now + WINDOW);
        assert!(after.allowed);
        assert_eq!(after.remaining, 4);
        assert_eq!(after.reset_at_ms, now + 2 * WINDOW);
    }

    #[test]
    fn test_rollover_burst_sees_fresh_window() {
        let limiter = RateLimiter::new();
        let now = 1_000_000;
        for _ in 0..5 {
            limiter.check_at("k", WINDOW, 5, now);
        }

        // Burst arriving exactly at the rollover instant: all five admitted.
        let rollover = now + WINDOW;
        for i in 0..5 {
            let d = limiter.check_at("k", WINDOW, 5, rollover);
            assert!(d.allowed, "rollover request {} should be allowed", i + 1);
        }
        assert!(!limiter.check_at("k", WINDOW, 5, rollover).allowed);
    }

    #[test]
    fn test_zero_max_always_denies() {
        let limiter = RateLimiter::new();
        let d = limiter.check_at("k", WINDOW, 0, 1_000_000);
        assert!(!d.allowed);
        assert_eq!(d.retry_after_secs, 60);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let limiter = RateLimiter::new();
        let now = 1_000_000;
        limiter.check_at("k", WINDOW, 1, now);

        // 59.5s left in the window reports as 60 whole seconds.
        let d = limiter.check_at("k", WINDOW, 1, now + 500);
        assert!(!d.allowed);
        assert_eq!(d.retry_after_secs, 60);
    }

    #[test]
    fn test_sweep_removes_lapsed_entries() {
        let limiter = RateLimiter::new();
        let now = 1_000_000;
        limiter.check_at("stale", WINDOW, 5, now);
        limiter.check_at("fresh", WINDOW, 5, now + WINDOW * 3);

        let removed = limiter.sweep_expired(now + WINDOW * 3, WINDOW);
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
