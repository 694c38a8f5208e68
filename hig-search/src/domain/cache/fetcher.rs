use std::sync::Arc;

use tracing::warn;

use super::origin::{fetch_with_retry, ContentOrigin, RetryPolicy};
use super::resilient::{CacheError, CacheHit, CacheStats, ResilientCache};

/// Raw content fetching through the resilient cache.
///
/// Origin calls are retried per the policy; a dead origin serves the last
/// good copy while it is within its stale deadline.
#[derive(Clone)]
pub struct ContentFetcher {
    cache: ResilientCache<String>,
    origin: Arc<dyn ContentOrigin>,
    policy: RetryPolicy,
}

impl ContentFetcher {
    pub fn new(
        cache: ResilientCache<String>,
        origin: Arc<dyn ContentOrigin>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            origin,
            policy,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<CacheHit<String>, CacheError> {
        let origin = Arc::clone(&self.origin);
        let policy = self.policy;
        let label = url.to_string();

        self.cache
            .get_with_graceful_fallback(url, move || async move {
                fetch_with_retry(&policy, &label, || origin.fetch(&label)).await
            })
            .await
    }

    /// Fetch `url`, substituting `default` on a hard miss.
    pub async fn fetch_or_default(&self, url: &str, default: &str) -> String {
        match self.fetch(url).await {
            Ok(hit) => hit.value,
            Err(e) => {
                warn!(url, error = %e, "Using static default content");
                default.to_string()
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
