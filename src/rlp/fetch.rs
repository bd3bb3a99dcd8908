use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Result, ScrapeError};
use crate::model::Source;

/// Exponential backoff with a jitter hook. The jitter function is a plain
/// field so tests can swap in [`no_jitter`] and assert exact delays.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: fn(Duration) -> Duration,
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before the retry following failed attempt number `attempt`
    /// (1-based): base * 2^(attempt-1), capped, plus jitter on the base.
    pub(crate) fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(10);
        let exp = self.base_delay.saturating_mul(1 << shift);
        exp.min(self.max_delay) + (self.jitter)(self.base_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(6),
            jitter: uniform_jitter,
        }
    }
}

/// Uniform random jitter in `[0, d)`, to spread herds of retries.
pub fn uniform_jitter(d: Duration) -> Duration {
    d.mul_f64(rand::thread_rng().gen::<f64>())
}

/// No jitter; deterministic delays for tests.
pub fn no_jitter(_: Duration) -> Duration {
    Duration::ZERO
}

/// Anything the aggregator can pull documents from. Implemented by the
/// real HTTP [`Fetcher`] and by in-memory fixtures in tests.
pub(crate) trait FetchDocument: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Provenance tag stamped onto records built from this source.
    fn provenance(&self) -> Source {
        Source::Rlp
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP fetcher with retry, backoff and a global rate ceiling.
///
/// The limiter is owned here and gates every attempt, so the ceiling holds
/// across however many round tasks are in flight.
pub(crate) struct Fetcher {
    http: reqwest::Client,
    limiter: DirectLimiter,
    policy: RetryPolicy,
}

impl Fetcher {
    pub(crate) fn new(http: reqwest::Client, policy: RetryPolicy, ceiling_rps: NonZeroU32) -> Self {
        Self {
            http,
            limiter: RateLimiter::direct(Quota::per_second(ceiling_rps)),
            policy,
        }
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        self.limiter.until_ready().await;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Http {
                url: url.to_owned(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                url: url.to_owned(),
                status,
            });
        }

        response.text().await.map_err(|e| ScrapeError::ResponseBody {
            url: url.to_owned(),
            source: e,
        })
    }

    /// Fetch with retries on transient failures. Terminal failures (4xx
    /// other than 429, malformed URLs) surface immediately; exhausting the
    /// attempt budget surfaces `RetriesExhausted` with the last cause.
    pub(crate) async fn get(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_once(url).await {
                Ok(body) => {
                    debug!(url, attempt, bytes = body.len(), "fetched page");
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient fetch failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(ScrapeError::RetriesExhausted {
                        url: url.to_owned(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl FetchDocument for Fetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.get(url))
    }
}
