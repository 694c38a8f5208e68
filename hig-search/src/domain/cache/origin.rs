//! Origin content fetching, bounded by a timeout and retried with backoff.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

/// Failure talking to an upstream content origin.
///
/// `Clone` so that one in-flight fetch result can be handed to every
/// coalesced waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OriginError {
    #[error("Origin request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Origin returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<OriginError> },
}

impl OriginError {
    /// Client errors will not heal on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            OriginError::Status { status, .. } => !(400..500).contains(status) || *status == 429,
            _ => true,
        }
    }
}

impl From<reqwest::Error> for OriginError {
    fn from(e: reqwest::Error) -> Self {
        OriginError::Http(e.to_string())
    }
}

/// Timeout and retry bounds for origin fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Per-attempt timeout
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based): `initial * 2^retry`,
    /// capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64();
        let max = self.max_backoff.as_secs_f64();
        let exp_backoff = base * 2_f64.powi(retry as i32);
        Duration::from_secs_f64(exp_backoff.min(max))
    }
}

/// Run `op` until it succeeds, a non-retryable error occurs, or the policy's
/// attempts are exhausted. Every attempt is bounded by `policy.timeout`.
pub async fn fetch_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, OriginError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OriginError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(OriginError::Timeout(policy.timeout)),
        };

        let err = match result {
            Ok(value) => {
                debug!(label, attempt, "Origin fetch succeeded");
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            warn!(label, attempt, error = %err, "Origin fetch failed, not retrying");
            return Err(err);
        }
        if attempt >= max_attempts {
            error!(label, attempts = attempt, error = %err, "All origin fetch attempts failed");
            return Err(OriginError::Exhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let backoff = policy.backoff(attempt - 1);
        warn!(
            label,
            attempt = attempt + 1,
            max_attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Retrying origin fetch"
        );
        tokio::time::sleep(backoff).await;
    }
}

/// Upstream source of raw content addressed by URL.
#[async_trait]
pub trait ContentOrigin: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, OriginError>;
}

/// Fetches content over HTTP, treating non-success statuses as errors.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client whose requests are bounded by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, OriginError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hig-search/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ContentOrigin for HttpOrigin {
    async fn fetch(&self, url: &str) -> Result<String, OriginError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Origin serving a swappable body; `None` makes every fetch fail with 503.
    #[derive(Clone, Default)]
    pub struct MockOrigin {
        body: Arc<Mutex<Option<String>>>,
        delay: Duration,
        call_count: Arc<AtomicUsize>,
    }

    impl MockOrigin {
        pub fn serving(body: &str) -> Self {
            let origin = Self::default();
            origin.set_body(Some(body));
            origin
        }

        pub fn failing() -> Self {
            Self::default()
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn set_body(&self, body: Option<&str>) {
            *self.body.lock().unwrap() = body.map(str::to_string);
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentOrigin for MockOrigin {
        async fn fetch(&self, url: &str) -> Result<String, OriginError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let body = self.body.lock().unwrap().clone();
            body.ok_or_else(|| OriginError::Status {
                status: 503,
                url: url.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::mock::MockOrigin;
    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(200),
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            ..Default::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let status = |status| OriginError::Status {
            status,
            url: "https://example.com".to_string(),
        };
        assert!(!status(404).is_retryable());
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(OriginError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = fetch_with_retry(&fast_policy(3), "flaky", || {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(OriginError::Http("connection reset".to_string()))
                } else {
                    Ok("body")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_report_last_error() {
        let origin = MockOrigin::failing();
        let result = fetch_with_retry(&fast_policy(2), "down", || origin.fetch("https://x")).await;

        match result {
            Err(OriginError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, OriginError::Status { status: 503, .. }));
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
        assert_eq!(origin.call_count(), 2);
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let origin = MockOrigin::serving("late").with_delay(Duration::from_secs(5));
        let policy = RetryPolicy {
            timeout: Duration::from_millis(10),
            ..fast_policy(1)
        };
        let result = fetch_with_retry(&policy, "slow", || origin.fetch("https://x")).await;

        match result {
            Err(OriginError::Exhausted { last, .. }) => {
                assert!(matches!(*last, OriginError::Timeout(_)));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn not_found_is_returned_immediately() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: Result<(), _> = fetch_with_retry(&fast_policy(5), "missing", || {
            let attempts = Arc::clone(&attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(OriginError::Status {
                    status: 404,
                    url: "https://x".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(OriginError::Status { status: 404, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
