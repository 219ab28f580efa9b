//! Atomic counters shared across requests.
//!
//! Every operation on a [`CounterStore`] is a single atomic step: callers
//! never read a counter and then write it back. The in-memory store holds a
//! `DashMap` entry lock for the duration of each operation, so it is only
//! atomic within one process. Multi-instance deployments need a shared store
//! implementing the same trait.
//!
//! Expired windows and leases are swept once a map outgrows its high-water
//! mark. A swept key behaves exactly like one never seen.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Minimum map size before a sweep runs.
const SWEEP_THRESHOLD: usize = 1024;

/// A counter that resets when its window elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounter {
    /// Amount accepted in the current window.
    pub value: u64,
    /// Unix millis when the current window started.
    pub window_start_ms: i64,
    /// Unix millis after which the counter reads as empty.
    pub expires_at_ms: i64,
}

/// Result of an increment-within-cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapCheck {
    /// Whether the full amount was added.
    pub accepted: bool,
    /// Counter value after the operation.
    pub value: u64,
    /// Start of the window the value belongs to.
    pub window_start_ms: i64,
}

/// Atomic counter primitives.
pub trait CounterStore: Send + Sync {
    /// Adds `amount` to the counter at `key` if the total stays within `cap`.
    ///
    /// The window restarts at `now_ms` once `now_ms - start >= window_ms`.
    /// The increment is all-or-nothing.
    fn incr_within_cap(&self, key: &str, amount: u64, cap: u64, window_ms: i64, now_ms: i64) -> CapCheck;

    /// Current window, if the counter exists.
    fn window(&self, key: &str) -> Option<WindowCounter>;

    /// Takes a lease on `key` for `ttl_ms`.
    ///
    /// Fails with the remaining lease time while another lease is live.
    fn try_acquire(&self, key: &str, ttl_ms: i64, now_ms: i64) -> Result<(), i64>;
}

/// Single-process counter store.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: DashMap<String, WindowCounter>,
    leases: DashMap<String, i64>,
    windows_high_water: AtomicUsize,
    leases_high_water: AtomicUsize,
}

impl InMemoryCounterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every window and lease that has run out at `now_ms`.
    ///
    /// Returns how many keys were removed.
    pub fn evict_expired(&self, now_ms: i64) -> usize {
        let before = self.windows.len() + self.leases.len();
        self.windows.retain(|_, w| w.expires_at_ms > now_ms);
        self.leases.retain(|_, expires| *expires > now_ms);
        let removed = before.saturating_sub(self.windows.len() + self.leases.len());
        if removed > 0 {
            debug!("Evicted {} expired counter key(s)", removed);
        }
        removed
    }

    /// Number of live window and lease keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len() + self.leases.len()
    }

    /// Check if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweeps `map` when it has doubled since the last sweep.
    ///
    /// Must run before taking an entry guard on `map`.
    fn maybe_sweep<V>(
        map: &DashMap<String, V>,
        high_water: &AtomicUsize,
        live: impl Fn(&V) -> bool,
    ) {
        let mark = high_water.load(Ordering::Relaxed).max(SWEEP_THRESHOLD);
        if map.len() <= mark {
            return;
        }
        map.retain(|_, v| live(v));
        high_water.store(map.len().saturating_mul(2), Ordering::Relaxed);
    }
}

impl CounterStore for InMemoryCounterStore {
    fn incr_within_cap(&self, key: &str, amount: u64, cap: u64, window_ms: i64, now_ms: i64) -> CapCheck {
        Self::maybe_sweep(&self.windows, &self.windows_high_water, |w| w.expires_at_ms > now_ms);
        let mut entry = self.windows.entry(key.to_string()).or_insert(WindowCounter {
            value: 0,
            window_start_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(window_ms),
        });
        if now_ms.saturating_sub(entry.window_start_ms) >= window_ms {
            debug!("Counter `{}` window rolled over", key);
            entry.value = 0;
            entry.window_start_ms = now_ms;
        }
        entry.expires_at_ms = entry.window_start_ms.saturating_add(window_ms);

        let accepted = entry.value.checked_add(amount).is_some_and(|total| total <= cap);
        if accepted {
            entry.value += amount;
        }
        CapCheck {
            accepted,
            value: entry.value,
            window_start_ms: entry.window_start_ms,
        }
    }

    fn window(&self, key: &str) -> Option<WindowCounter> {
        self.windows.get(key).map(|w| *w)
    }

    fn try_acquire(&self, key: &str, ttl_ms: i64, now_ms: i64) -> Result<(), i64> {
        Self::maybe_sweep(&self.leases, &self.leases_high_water, |expires| *expires > now_ms);
        let mut expires = self.leases.entry(key.to_string()).or_insert(i64::MIN);
        if *expires > now_ms {
            return Err(*expires - now_ms);
        }
        *expires = now_ms.saturating_add(ttl_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incr_is_all_or_nothing() {
        let store = InMemoryCounterStore::new();
        assert!(store.incr_within_cap("k", 30, 50, 1_000, 0).accepted);
        let check = store.incr_within_cap("k", 30, 50, 1_000, 10);
        assert!(!check.accepted);
        assert_eq!(check.value, 30);
        assert!(store.incr_within_cap("k", 20, 50, 1_000, 20).accepted);
        assert_eq!(store.window("k").map(|w| w.value), Some(50));
    }

    #[test]
    fn test_window_rolls_over() {
        let store = InMemoryCounterStore::new();
        store.incr_within_cap("k", 50, 50, 1_000, 0);
        assert!(!store.incr_within_cap("k", 1, 50, 1_000, 999).accepted);
        let check = store.incr_within_cap("k", 1, 50, 1_000, 1_000);
        assert!(check.accepted);
        assert_eq!(check.value, 1);
        assert_eq!(check.window_start_ms, 1_000);
    }

    #[test]
    fn test_lease() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.try_acquire("use", 500, 0), Ok(()));
        assert_eq!(store.try_acquire("use", 500, 1), Err(499));
        assert_eq!(store.try_acquire("other", 500, 1), Ok(()));
        assert_eq!(store.try_acquire("use", 500, 500), Ok(()));
    }

    #[test]
    fn test_evict_expired() {
        let store = InMemoryCounterStore::new();
        store.incr_within_cap("short", 10, 50, 100, 0);
        store.incr_within_cap("long", 10, 50, 10_000, 0);
        assert_eq!(store.try_acquire("use", 100, 0), Ok(()));
        assert_eq!(store.len(), 3);

        assert_eq!(store.evict_expired(100), 2);
        assert!(store.window("short").is_none());
        assert_eq!(store.window("long").map(|w| w.value), Some(10));

        // an evicted key starts over exactly like a rolled-over one
        let check = store.incr_within_cap("short", 50, 50, 100, 150);
        assert!(check.accepted);
        assert_eq!(check.window_start_ms, 150);
        assert_eq!(store.try_acquire("use", 100, 150), Ok(()));
    }

    #[test]
    fn test_many_short_leases_stay_bounded() {
        let store = InMemoryCounterStore::new();
        for i in 0..10_000_i64 {
            assert_eq!(store.try_acquire(&format!("item:{i}"), 1, i), Ok(()));
        }
        assert!(store.len() <= 2 * SWEEP_THRESHOLD + 1);
    }
}
