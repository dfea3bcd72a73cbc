//! Per-key rate limiting for the `rate_limit` rule.
//!
//! [`MemoryCounterStore`] keeps one GCRA limiter per key in a `DashMap`.
//! The number of tracked keys is capped: when a new key arrives at the cap,
//! the least recently used entry is evicted. Keys are usually derived from
//! client-controlled input (`X-Forwarded-For`), so the cap is what bounds
//! memory.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::BoxFuture;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::error::{GateError, Result};

/// Default maximum number of tracked keys.
pub const DEFAULT_MAX_KEYS: usize = 100_000;

/// Admits or refuses requests per key.
///
/// Injected into rate-limit rules so the limiters' lifetime and sharing are
/// decided by the caller.
pub trait CounterStore: Send + Sync {
    /// Records one request for `key` and returns true if it fits in a quota
    /// of `limit` requests per `window`.
    fn check<'a>(
        &'a self,
        key: &'a str,
        limit: u64,
        window: Duration,
    ) -> BoxFuture<'a, Result<bool>>;

    /// Forgets `key`.
    fn reset<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

type KeyRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct LimiterEntry {
    limiter: KeyRateLimiter,
    quota: Quota,
    /// Milliseconds since `created_at` at the last access.
    last_access: AtomicU64,
    created_at: Instant,
}

impl LimiterEntry {
    fn new(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::direct(quota),
            quota,
            last_access: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    fn age_ms(&self) -> u64 {
        u64::try_from(self.created_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn touch(&self) {
        self.last_access.store(self.age_ms(), Ordering::Relaxed);
    }

    fn idle_ms(&self) -> u64 {
        self.age_ms()
            .saturating_sub(self.last_access.load(Ordering::Relaxed))
    }

    fn is_stale(&self, max_age: Duration) -> bool {
        u128::from(self.idle_ms()) > max_age.as_millis()
    }
}

/// Builds the quota admitting `limit` requests per `window`, as a burst of
/// `limit` refilled one cell every `window / limit`.
fn quota_for(limit: NonZeroU32, window: Duration) -> Result<Quota> {
    Quota::with_period(window / limit.get())
        .map(|quota| quota.allow_burst(limit))
        .ok_or_else(|| GateError::Config(format!("rate limit window too short: {window:?}")))
}

/// In-process [`CounterStore`] backed by `governor` limiters.
pub struct MemoryCounterStore {
    limiters: DashMap<String, LimiterEntry>,
    max_keys: usize,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCounterStore")
            .field("keys", &self.limiters.len())
            .field("max_keys", &self.max_keys)
            .finish()
    }
}

impl MemoryCounterStore {
    /// Creates an empty store tracking at most [`DEFAULT_MAX_KEYS`] keys.
    pub fn new() -> Self {
        Self::with_max_keys(DEFAULT_MAX_KEYS)
    }

    /// Creates an empty store tracking at most `max_keys` keys.
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            limiters: DashMap::new(),
            max_keys: max_keys.max(1),
        }
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Returns true if no keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Removes keys not seen for longer than `max_age`, returning how many
    /// were removed.
    pub fn cleanup_stale(&self, max_age: Duration) -> usize {
        let before = self.limiters.len();
        self.limiters.retain(|_, entry| !entry.is_stale(max_age));
        let removed = before.saturating_sub(self.limiters.len());
        if removed > 0 {
            debug!(removed, "Removed stale rate limit entries");
        }
        removed
    }

    fn evict_oldest(&self) {
        let oldest = self
            .limiters
            .iter()
            .max_by_key(|entry| entry.value().idle_ms())
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            if self.limiters.remove(&key).is_some() {
                debug!(key = %key, "Evicted least recently used rate limit entry");
            }
        }
    }

    fn admit(&self, key: &str, limit: u64, window: Duration) -> Result<bool> {
        let Some(limit) = NonZeroU32::new(u32::try_from(limit).unwrap_or(u32::MAX)) else {
            return Ok(false);
        };
        let quota = quota_for(limit, window)?;

        if !self.limiters.contains_key(key) && self.limiters.len() >= self.max_keys {
            self.evict_oldest();
        }

        let mut entry = self
            .limiters
            .entry(key.to_string())
            .or_insert_with(|| LimiterEntry::new(quota));
        if entry.quota != quota {
            *entry = LimiterEntry::new(quota);
        }
        entry.touch();
        Ok(entry.limiter.check().is_ok())
    }
}

impl CounterStore for MemoryCounterStore {
    fn check<'a>(
        &'a self,
        key: &'a str,
        limit: u64,
        window: Duration,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(futures::future::ready(self.admit(key, limit, window)))
    }

    fn reset<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        self.limiters.remove(key);
        Box::pin(futures::future::ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admits_up_to_limit_per_key() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);
        assert!(store.check("ip:1", 2, window).await.unwrap());
        assert!(store.check("ip:1", 2, window).await.unwrap());
        assert!(!store.check("ip:1", 2, window).await.unwrap());
        assert!(store.check("ip:2", 2, window).await.unwrap());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_quota_replenishes_after_window() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_millis(40);
        assert!(store.check("k", 1, window).await.unwrap());
        assert!(!store.check("k", 1, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.check("k", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_limit_refuses() {
        let store = MemoryCounterStore::new();
        assert!(!store.check("k", 0, Duration::from_secs(1)).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_zero_window_is_config_error() {
        let store = MemoryCounterStore::new();
        let err = store.check("k", 5, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[tokio::test]
    async fn test_key_count_is_capped() {
        let store = MemoryCounterStore::with_max_keys(2);
        let window = Duration::from_secs(60);
        assert!(store.check("a", 1, window).await.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.check("b", 1, window).await.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.check("c", 1, window).await.unwrap());
        assert_eq!(store.len(), 2);

        // "b" kept its exhausted quota, "a" was evicted and starts over.
        assert!(!store.check("b", 1, window).await.unwrap());
        assert!(store.check("a", 1, window).await.unwrap());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_stay_bounded() {
        let store = MemoryCounterStore::with_max_keys(100);
        for i in 0..1_000 {
            store
                .check(&format!("10.0.{}.{}", i / 256, i % 256), 5, Duration::from_millis(1))
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 100);
    }

    #[tokio::test]
    async fn test_cleanup_stale() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);
        store.check("old", 1, window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.check("fresh", 1, window).await.unwrap();

        assert_eq!(store.cleanup_stale(Duration::from_millis(20)), 1);
        assert_eq!(store.len(), 1);
        assert!(!store.check("fresh", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_changed_quota_replaces_limiter() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);
        assert!(store.check("k", 1, window).await.unwrap());
        assert!(!store.check("k", 1, window).await.unwrap());
        assert!(store.check("k", 3, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_reset() {
        let store = MemoryCounterStore::new();
        store.check("k", 1, Duration::from_secs(1)).await.unwrap();
        store.reset("k").await.unwrap();
        assert!(store.is_empty());
    }
}
