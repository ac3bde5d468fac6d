use serde::Serialize;
use thiserror::Error;

/// Status codes that indicate a transient upstream condition worth retrying.
const RETRYABLE_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Outcome of a single upstream attempt that did not yield a usable payload.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The per-attempt deadline fired before the upstream responded.
    #[error("upstream timed out after {timeout_ms}ms: {url}")]
    Timeout { url: String, timeout_ms: u64 },

    /// DNS, connection or TLS level failure.
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// Upstream answered with a non-2xx status. Body is kept for diagnostics.
    #[error("upstream returned HTTP {status} for {url}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    /// HTTP 429, with the Retry-After hint (seconds) when the upstream sent one.
    #[error("rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<u64>,
    },

    /// The payload parsed but cannot yield even a partial canonical record.
    /// Never retried: a shape mismatch will not fix itself.
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Network { .. } => true,
            FetchError::RateLimited { .. } => true,
            FetchError::Http { status, .. } => RETRYABLE_STATUSES.contains(status),
            FetchError::Malformed(_) => false,
        }
    }

    /// Upstream HTTP status, when one was observed.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            FetchError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Retry-After hint in seconds, present only after a 429 carried one.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            FetchError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Structured error body handed to consumers when an aggregate query fails
/// outright. Carries enough context for the caller to decide on a retry.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsError {
    pub error: String,
    /// Suggested HTTP status for the serving layer.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl StatsError {
    pub fn from_fetch(err: &FetchError) -> Self {
        let (error, status, details) = match err {
            FetchError::Timeout { .. } => ("upstream_timeout", 504, Some(err.to_string())),
            FetchError::Network { .. } => ("upstream_unreachable", 502, Some(err.to_string())),
            FetchError::RateLimited { .. } => ("rate_limited", 429, Some(err.to_string())),
            FetchError::Http { .. } => ("upstream_error", 502, Some(err.to_string())),
            FetchError::Malformed(_) => ("malformed_upstream_response", 502, Some(err.to_string())),
        };
        StatsError {
            error: error.to_string(),
            status,
            details,
            retry_after: err.retry_after(),
        }
    }
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {})", self.error, self.status)
    }
}

impl std::error::Error for StatsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = FetchError::Timeout {
            url: "http://x".into(),
            timeout_ms: 100,
        };
        assert!(timeout.is_retryable());

        let network = FetchError::Network {
            url: "http://x".into(),
            reason: "connection refused".into(),
        };
        assert!(network.is_retryable());

        for status in [408, 425, 429, 500, 502, 503, 504] {
            let err = FetchError::Http {
                url: "http://x".into(),
                status,
                body: String::new(),
            };
            assert!(err.is_retryable(), "status {status} should retry");
        }

        for status in [400, 401, 403, 404, 422] {
            let err = FetchError::Http {
                url: "http://x".into(),
                status,
                body: String::new(),
            };
            assert!(!err.is_retryable(), "status {status} must not retry");
        }

        assert!(!FetchError::Malformed("bad shape".into()).is_retryable());
    }

    #[test]
    fn test_rate_limit_hint_propagates_to_stats_error() {
        let err = FetchError::RateLimited {
            url: "http://x".into(),
            retry_after: Some(20),
        };
        let body = StatsError::from_fetch(&err);
        assert_eq!(body.status, 429);
        assert_eq!(body.retry_after, Some(20));
        assert_eq!(body.error, "rate_limited");
    }

    #[test]
    fn test_stats_error_serializes_camel_case() {
        let body = StatsError {
            error: "rate_limited".into(),
            status: 429,
            details: None,
            retry_after: Some(20),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["retryAfter"], 20);
        assert!(json.get("details").is_none());
    }
}
