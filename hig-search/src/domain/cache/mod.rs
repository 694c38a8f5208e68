//! Resilient content caching in front of slow or flaky origins.
//!
//! - [`ResilientCache`] - Fresh/stale tiers, graceful fallback, single-flight
//! - [`ContentOrigin`] - Upstream content source ([`HttpOrigin`], mocks)
//! - [`ContentFetcher`] - Origin plus retry policy plus cache

mod clock;
mod fetcher;
mod origin;
mod resilient;

pub use clock::{Clock, SystemClock};
pub use fetcher::ContentFetcher;
pub use origin::{fetch_with_retry, ContentOrigin, HttpOrigin, OriginError, RetryPolicy};
pub use resilient::{CacheConfig, CacheError, CacheHit, CacheStats, CacheTier, ResilientCache};

#[cfg(test)]
pub(crate) use origin::mock::MockOrigin;
