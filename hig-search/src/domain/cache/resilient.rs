//! Two-tier (fresh/stale) cache with graceful fallback and single-flight
//! origin fetches.
//!
//! Each entry carries two deadlines. Before `fresh_until` it is served as
//! fresh. Until `stale_until` it is still served, flagged stale, and a read
//! through [`ResilientCache::get_with_graceful_fallback`] tries to refresh it
//! first. Past `stale_until` it is gone: an expired backup is never served.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::origin::OriginError;

/// The only error the cache surfaces: nothing usable cached and the origin
/// failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("Cache miss for {key} and origin failed: {source}")]
    Miss { key: String, source: OriginError },
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub fresh_ttl_secs: u64,
    /// Stale TTL as a multiple of the fresh TTL
    #[serde_as(as = "DisplayFromStr")]
    pub stale_multiplier: u32,
    #[serde_as(as = "DisplayFromStr")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl_secs: 3600,
            stale_multiplier: 24,
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn fresh_ttl(&self) -> Duration {
        Duration::from_secs(self.fresh_ttl_secs)
    }

    pub fn stale_ttl(&self) -> Duration {
        self.fresh_ttl() * self.stale_multiplier.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CacheTier {
    Fresh,
    Stale,
}

/// A cached value and the tier it was served from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<V> {
    pub value: V,
    pub tier: CacheTier,
}

impl<V> CacheHit<V> {
    pub fn is_fresh(&self) -> bool {
        self.tier == CacheTier::Fresh
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: u64,
    pub fresh_hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub origin_fetches: u64,
    pub coalesced_waits: u64,
    pub stale_fallbacks: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fresh_until: OffsetDateTime,
    stale_until: OffsetDateTime,
}

impl<V> CacheEntry<V> {
    fn tier(&self, now: OffsetDateTime) -> Option<CacheTier> {
        if now < self.fresh_until {
            Some(CacheTier::Fresh)
        } else if now < self.stale_until {
            Some(CacheTier::Stale)
        } else {
            None
        }
    }
}

#[derive(Default)]
struct Counters {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    origin_fetches: AtomicU64,
    coalesced_waits: AtomicU64,
    stale_fallbacks: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

type InFlight<V> = Shared<BoxFuture<'static, Result<V, OriginError>>>;

struct Inner<V> {
    entries: moka::sync::Cache<String, CacheEntry<V>>,
    in_flight: Mutex<HashMap<String, InFlight<V>>>,
    clock: Arc<dyn Clock>,
    fresh_ttl: Duration,
    stale_ttl: Duration,
    counters: Counters,
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Current tiered value; evicts entries past their stale deadline.
    fn lookup(&self, key: &str) -> Option<CacheHit<V>> {
        let entry = self.entries.get(key)?;
        match entry.tier(self.clock.now()) {
            Some(tier) => Some(CacheHit {
                value: entry.value,
                tier,
            }),
            None => {
                debug!(key, "Cache entry expired");
                self.entries.invalidate(key);
                None
            }
        }
    }

    fn store(&self, key: &str, value: V) {
        let now = self.clock.now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                fresh_until: now + self.fresh_ttl,
                stale_until: now + self.stale_ttl,
            },
        );
    }
}

/// Shared, cheaply cloneable resilient cache.
///
/// # Examples
///
/// ```ignore
/// let cache = ResilientCache::new(&CacheConfig::default());
/// let page = cache
///     .get_with_graceful_fallback(url, move || async move { origin.fetch(&url).await })
///     .await?;
/// if !page.is_fresh() {
///     // Origin is down, serving the last good copy
/// }
/// ```
pub struct ResilientCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for ResilientCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> ResilientCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let fresh_ttl = config.fresh_ttl();
        Self {
            inner: Arc::new(Inner {
                entries: moka::sync::Cache::builder()
                    .max_capacity(config.max_entries)
                    .build(),
                in_flight: Mutex::new(HashMap::new()),
                clock,
                fresh_ttl,
                stale_ttl: config.stale_ttl().max(fresh_ttl),
                counters: Counters::default(),
            }),
        }
    }

    /// The stored value and its tier, or `None` once past the stale deadline.
    pub fn get(&self, key: &str) -> Option<CacheHit<V>> {
        let hit = self.inner.lookup(key);
        let counters = &self.inner.counters;
        match &hit {
            Some(hit) if hit.is_fresh() => bump(&counters.fresh_hits),
            Some(_) => bump(&counters.stale_hits),
            None => bump(&counters.misses),
        }
        hit
    }

    /// Store a value, resetting the key to fresh.
    pub fn set(&self, key: &str, value: V) {
        self.inner.store(key, value);
    }

    pub fn invalidate(&self, key: &str) {
        self.inner.entries.invalidate(key);
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entries.run_pending_tasks();
        self.inner.entries.entry_count()
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheStats {
            entries: self.entry_count(),
            fresh_hits: load(&counters.fresh_hits),
            stale_hits: load(&counters.stale_hits),
            misses: load(&counters.misses),
            origin_fetches: load(&counters.origin_fetches),
            coalesced_waits: load(&counters.coalesced_waits),
            stale_fallbacks: load(&counters.stale_fallbacks),
        }
    }

    /// Serve a fresh value, refreshing from the origin when needed.
    ///
    /// - Fresh: returned without calling `fetch`.
    /// - Stale or missing: `fetch` runs, at most once per key across all
    ///   concurrent callers. Success is stored and returned fresh.
    /// - Fetch failed: the stale value is returned if one is still within
    ///   its stale deadline, otherwise [`CacheError::Miss`].
    pub async fn get_with_graceful_fallback<F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<CacheHit<V>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, OriginError>> + Send + 'static,
    {
        if let Some(hit) = self.get(key) {
            if hit.is_fresh() {
                return Ok(hit);
            }
            debug!(key, "Serving stale entry requires refresh");
        }

        match self.join_or_start(key, fetch).await {
            Ok(value) => Ok(CacheHit {
                value,
                tier: CacheTier::Fresh,
            }),
            Err(source) => match self.inner.lookup(key) {
                Some(hit) => {
                    bump(&self.inner.counters.stale_fallbacks);
                    warn!(
                        key,
                        tier = %hit.tier,
                        error = %source,
                        "Origin failed, serving cached copy"
                    );
                    Ok(hit)
                }
                None => {
                    warn!(key, error = %source, "Origin failed with nothing cached");
                    Err(CacheError::Miss {
                        key: key.to_string(),
                        source,
                    })
                }
            },
        }
    }

    /// Join the fetch already running for `key`, or start one.
    fn join_or_start<F, Fut>(&self, key: &str, fetch: F) -> InFlight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, OriginError>> + Send + 'static,
    {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(flight) = in_flight.get(key) {
            bump(&self.inner.counters.coalesced_waits);
            debug!(key, "Joining in-flight origin fetch");
            return flight.clone();
        }

        // A fetch may have finished between our read and taking the lock
        if let Some(hit) = self.inner.lookup(key).filter(CacheHit::is_fresh) {
            return futures::future::ready(Ok(hit.value)).boxed().shared();
        }

        bump(&self.inner.counters.origin_fetches);
        info!(key, "Fetching from origin");

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let origin = fetch();
        let flight = async move {
            let result = origin.await;
            if let Ok(value) = &result {
                inner.store(&owned_key, value.clone());
            }
            inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&owned_key);
            result
        }
        .boxed()
        .shared();

        in_flight.insert(key.to_string(), flight.clone());
        flight
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use time::macros::datetime;

    use super::*;
    use crate::domain::cache::clock::mock::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);
    const HOUR: Duration = Duration::from_secs(3600);

    fn hourly_cache() -> (ResilientCache<String>, ManualClock) {
        let clock = ManualClock::new(datetime!(2024-05-01 0:00 UTC));
        let config = CacheConfig {
            fresh_ttl_secs: 3600,
            stale_multiplier: 24,
            max_entries: 100,
        };
        (
            ResilientCache::with_clock(&config, Arc::new(clock.clone())),
            clock,
        )
    }

    fn failing() -> impl Future<Output = Result<String, OriginError>> + Send + 'static {
        async { Err(OriginError::Http("connection refused".to_string())) }
    }

    #[test]
    fn tiers_follow_fresh_and_stale_deadlines() {
        let (cache, clock) = hourly_cache();
        cache.set("k", "v".to_string());

        clock.advance(30 * MINUTE);
        assert_eq!(cache.get("k").unwrap().tier, CacheTier::Fresh);

        clock.advance(90 * MINUTE);
        assert_eq!(cache.get("k").unwrap().tier, CacheTier::Stale);

        clock.advance(23 * HOUR);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn set_resets_to_fresh() {
        let (cache, clock) = hourly_cache();
        cache.set("k", "old".to_string());
        clock.advance(2 * HOUR);
        cache.set("k", "new".to_string());

        let hit = cache.get("k").unwrap();
        assert_eq!(hit.value, "new");
        assert!(hit.is_fresh());
    }

    #[test]
    fn invalidate_removes_entry() {
        let (cache, _) = hourly_cache();
        cache.set("k", "v".to_string());
        assert_eq!(cache.entry_count(), 1);
        cache.invalidate("k");
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn fresh_values_skip_the_origin() {
        let (cache, _) = hourly_cache();
        cache.set("k", "cached".to_string());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let hit = cache
            .get_with_graceful_fallback("k", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("origin".to_string())
            })
            .await
            .unwrap();

        assert_eq!(hit.value, "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_values_are_refreshed() {
        let (cache, clock) = hourly_cache();
        cache.set("k", "old".to_string());
        clock.advance(2 * HOUR);

        let hit = cache
            .get_with_graceful_fallback("k", || async { Ok("new".to_string()) })
            .await
            .unwrap();
        assert_eq!(hit.value, "new");
        assert!(hit.is_fresh());
        assert!(cache.get("k").unwrap().is_fresh());
    }

    #[tokio::test]
    async fn origin_failure_serves_stale_copy() {
        let (cache, clock) = hourly_cache();
        cache.set("k", "old".to_string());
        clock.advance(2 * HOUR);

        let hit = cache.get_with_graceful_fallback("k", failing).await.unwrap();
        assert_eq!(hit.value, "old");
        assert_eq!(hit.tier, CacheTier::Stale);
        assert_eq!(cache.stats().stale_fallbacks, 1);
    }

    #[tokio::test]
    async fn origin_failure_without_copy_is_a_miss() {
        let (cache, _) = hourly_cache();
        let result = cache.get_with_graceful_fallback("k", failing).await;
        assert!(matches!(result, Err(CacheError::Miss { ref key, .. }) if key == "k"));
    }

    #[tokio::test]
    async fn expired_copy_is_never_served() {
        let (cache, clock) = hourly_cache();
        cache.set("k", "ancient".to_string());
        clock.advance(25 * HOUR);

        let result = cache.get_with_graceful_fallback("k", failing).await;
        assert!(matches!(result, Err(CacheError::Miss { .. })));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_origin_fetch() {
        let (cache, _) = hourly_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let requests = (0..16).map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            async move {
                cache
                    .get_with_graceful_fallback("k", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("value".to_string())
                    })
                    .await
            }
        });
        let results = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results
            .iter()
            .all(|r| matches!(r, Ok(hit) if hit.value == "value")));
        let stats = cache.stats();
        assert_eq!(stats.origin_fetches, 1);
        assert_eq!(stats.coalesced_waits, 15);
    }

    #[tokio::test]
    async fn coalesced_failures_are_shared_too() {
        let (cache, _) = hourly_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let requests = (0..4).map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_with_graceful_fallback("k", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<String, _>(OriginError::Http("down".to_string()))
                    })
                    .await
            })
        });
        let results = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert!(matches!(result.unwrap(), Err(CacheError::Miss { .. })));
        }
    }

    #[tokio::test]
    async fn next_call_after_completion_fetches_again() {
        let (cache, clock) = hourly_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, OriginError>("value".to_string())
            }
        };

        cache
            .get_with_graceful_fallback("k", fetch(Arc::clone(&calls)))
            .await
            .unwrap();
        clock.advance(2 * HOUR);
        cache
            .get_with_graceful_fallback("k", fetch(Arc::clone(&calls)))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
