pub mod explorer;
pub mod liquidity;
pub mod price;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::fetch::HttpFetcher;
use crate::records::{LiquiditySnapshot, TransactionRecord, VerifiedTransaction};
use crate::retry::{RetryPolicy, get_with_retry};

/// Wallet balance in native units, carried both exactly and as the float
/// approximation used for USD conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeBalance {
    pub amount: String,
    pub approx: f64,
}

/// Fetcher + retry policy bundle shared by the upstream clients.
#[derive(Clone)]
pub struct Upstream {
    fetcher: HttpFetcher,
    policy: RetryPolicy,
}

impl Upstream {
    pub fn new(fetcher: HttpFetcher, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// One logical upstream call: bounded attempts under the retry policy,
    /// then JSON parsing. An empty or unparseable body is `Malformed` and is
    /// never retried.
    pub async fn get_json(&self, url: &str, api_key: Option<&str>) -> Result<Value, FetchError> {
        let response = get_with_retry(&self.fetcher, &self.policy, url, api_key).await?;
        if response.body.trim().is_empty() {
            return Err(FetchError::Malformed(format!(
                "empty response body from {url}"
            )));
        }
        serde_json::from_str(&response.body)
            .map_err(|e| FetchError::Malformed(format!("invalid JSON from {url}: {e}")))
    }
}

/// Balance, transaction-list and receipt lookups against a block explorer.
#[async_trait]
pub trait ChainExplorer: Send + Sync {
    async fn native_balance(&self, address: &str) -> Result<NativeBalance, FetchError>;
    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, FetchError>;
    async fn receipt_status(&self, hash: &str) -> Result<VerifiedTransaction, FetchError>;
}

/// Locked-liquidity lookup for one trading pair.
#[async_trait]
pub trait LiquiditySource: Send + Sync {
    async fn pair_liquidity(
        &self,
        network: &str,
        pair_address: &str,
    ) -> Result<LiquiditySnapshot, FetchError>;
}

/// Spot USD price lookup.
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    async fn spot_usd(&self, token_id: &str) -> Result<f64, FetchError>;
}
