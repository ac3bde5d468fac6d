use async_trait::async_trait;
use tracing::debug;

use crate::error::FetchError;
use crate::normalize::coerce_f64;
use crate::providers::{SpotPriceSource, Upstream};

/// Coingecko-style simple-price API:
/// `GET /simple/price?ids={id}&vs_currencies=usd` → `{"<id>":{"usd":<n>}}`.
pub struct SimplePriceProvider {
    base_url: String,
    upstream: Upstream,
}

impl SimplePriceProvider {
    pub fn new(base_url: &str, upstream: Upstream) -> Self {
        SimplePriceProvider {
            base_url: base_url.to_string(),
            upstream,
        }
    }
}

#[async_trait]
impl SpotPriceSource for SimplePriceProvider {
    async fn spot_usd(&self, token_id: &str) -> Result<f64, FetchError> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, token_id
        );
        debug!("Requesting spot price from {}", url);
        let payload = self.upstream.get_json(&url, None).await?;

        payload
            .get(token_id)
            .and_then(|entry| entry.get("usd"))
            .ok_or_else(|| {
                FetchError::Malformed(format!("price response carries no usd quote for {token_id}"))
            })
            .and_then(coerce_f64)
    }
}
