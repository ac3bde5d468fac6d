use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use crate::error::FetchError;

/// A single bounded HTTP GET. Exactly one attempt per call; retrying is the
/// caller's concern (see [`crate::retry`]).
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

/// Raw outcome of a successful attempt: 2xx status plus the body text.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("prestat/0.2")
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, timeout })
    }

    /// Issues one GET and races it against the wall-clock deadline. When the
    /// timer fires first the request future is dropped, which aborts the
    /// in-flight connection; no exit path keeps the socket alive.
    pub async fn get_once(
        &self,
        url: &str,
        api_key: Option<&str>,
    ) -> Result<FetchResponse, FetchError> {
        debug!("GET {url}");

        let mut request = self.client.get(url);
        if let Some(key) = api_key {
            request = request.header("X-API-KEY", key);
        }

        let attempt = async {
            let response = request.send().await?;
            let status = response.status();
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, retry_after, body))
        };

        let (status, retry_after, body) = tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| classify_reqwest_error(url, self.timeout, &e))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                url: url.to_string(),
                retry_after,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn classify_reqwest_error(url: &str, timeout: Duration, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        // connect/DNS/TLS and body-read failures all count as network-level
        FetchError::Network {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Parses a `Retry-After` header given in delta-seconds. HTTP-date values are
/// ignored; none of the consulted upstreams send them.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
