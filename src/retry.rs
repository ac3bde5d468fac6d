use std::time::Duration;

use tracing::debug;

use crate::error::FetchError;
use crate::fetch::{FetchResponse, HttpFetcher};

/// Decides whether a failed attempt is worth repeating and how long to wait
/// before the next one.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Capped low to bound
    /// worst-case latency.
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_base: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// `attempt` is 1-based. Only transient failures within the attempt
    /// budget are retried; malformed payloads and plain client errors never
    /// are.
    pub fn should_retry(&self, err: &FetchError, attempt: u32) -> bool {
        attempt < self.max_attempts && err.is_retryable()
    }

    /// Super-linear growth (`base * attempt^1.5`) so that synchronized
    /// callers drift apart instead of hammering the upstream in lockstep.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = (attempt as f64).powf(1.5);
        self.backoff_base.mul_f64(factor)
    }
}

/// Drives [`HttpFetcher::get_once`] under a [`RetryPolicy`]. The error of the
/// final attempt is what surfaces, so a trailing 429 keeps its Retry-After
/// hint for the consumer.
pub async fn get_with_retry(
    fetcher: &HttpFetcher,
    policy: &RetryPolicy,
    url: &str,
    api_key: Option<&str>,
) -> Result<FetchResponse, FetchError> {
    let mut attempt = 1;
    loop {
        match fetcher.get_once(url, api_key).await {
            Ok(response) => return Ok(response),
            Err(err) => {
                if !policy.should_retry(&err, attempt) {
                    return Err(err);
                }
                let delay = policy.backoff_delay(attempt);
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt, policy.max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
