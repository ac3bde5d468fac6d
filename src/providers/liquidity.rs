use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::normalize::{coerce_f64, probe, probe_str, select_by_id};
use crate::providers::{LiquiditySource, Upstream};
use crate::records::LiquiditySnapshot;

/// Ordered shapes a locked-USD figure is known to arrive in.
const LOCKED_USD_PATHS: [&str; 3] = ["liquidity.usd", "liquidityUsd", "lockedUsd"];

/// Dexscreener-style pairs API: `GET /latest/dex/pairs/{network}/{pair}`
/// returning either a `pairs` array or a single `pair` object.
pub struct PairLiquidityProvider {
    base_url: String,
    provider_name: String,
    /// When the requested pair address is absent from the response, serve
    /// the first listed pair instead of failing. Best effort, opt-in.
    fallback_to_first: bool,
    upstream: Upstream,
}

impl PairLiquidityProvider {
    pub fn new(base_url: &str, fallback_to_first: bool, upstream: Upstream) -> Self {
        PairLiquidityProvider {
            base_url: base_url.to_string(),
            provider_name: "dexscreener".to_string(),
            fallback_to_first,
            upstream,
        }
    }
}

#[async_trait]
impl LiquiditySource for PairLiquidityProvider {
    async fn pair_liquidity(
        &self,
        network: &str,
        pair_address: &str,
    ) -> Result<LiquiditySnapshot, FetchError> {
        let url = format!(
            "{}/latest/dex/pairs/{}/{}",
            self.base_url, network, pair_address
        );
        debug!("Requesting pair liquidity from {}", url);
        let payload = self.upstream.get_json(&url, None).await?;

        let pair = select_pair(&payload, pair_address, self.fallback_to_first)?;
        normalize_pair(pair, &self.provider_name, &payload)
    }
}

fn select_pair<'a>(
    payload: &'a Value,
    pair_address: &str,
    fallback_to_first: bool,
) -> Result<&'a Value, FetchError> {
    if let Some(items) = payload.get("pairs").and_then(Value::as_array) {
        return select_by_id(items, "pairAddress", pair_address, fallback_to_first)
            .ok_or_else(|| {
                FetchError::Malformed(format!("pair {pair_address} not found in response"))
            });
    }
    if let Some(pair) = payload.get("pair").filter(|p| p.is_object()) {
        return Ok(pair);
    }
    Err(FetchError::Malformed(
        "liquidity response has neither 'pairs' nor 'pair'".into(),
    ))
}

fn normalize_pair(
    pair: &Value,
    provider_name: &str,
    payload: &Value,
) -> Result<LiquiditySnapshot, FetchError> {
    let locked_usd = probe(pair, &LOCKED_USD_PATHS)
        .ok_or_else(|| FetchError::Malformed("pair carries no liquidity figure".into()))
        .and_then(coerce_f64)?;

    // Optional fields stay null when absent, but a present-and-garbage
    // number is still a contract violation.
    let liquidity_base = probe(pair, &["liquidity.base", "liquidityBase"])
        .map(coerce_f64)
        .transpose()?;
    let liquidity_quote = probe(pair, &["liquidity.quote", "liquidityQuote"])
        .map(coerce_f64)
        .transpose()?;

    Ok(LiquiditySnapshot {
        locked_usd_amount: locked_usd.round() as i64,
        provider_name: provider_name.to_string(),
        base_token_symbol: probe_str(pair, &["baseToken.symbol"]).map(str::to_string),
        quote_token_symbol: probe_str(pair, &["quoteToken.symbol"]).map(str::to_string),
        liquidity_base_amount: liquidity_base,
        liquidity_quote_amount: liquidity_quote,
        provider_request_id: probe_str(payload, &["requestId"]).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpFetcher;
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, fallback: bool) -> PairLiquidityProvider {
        let upstream = Upstream::new(
            HttpFetcher::new(Duration::from_secs(2)).unwrap(),
            RetryPolicy::new(1, Duration::from_millis(1)),
        );
        PairLiquidityProvider::new(base_url, fallback, upstream)
    }

    async fn mock_pairs(server: &MockServer, network: &str, pair: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/latest/dex/pairs/{network}/{pair}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    #[test]
    fn test_all_known_shapes_normalize_identically() {
        let shapes = [
            json!({"pairAddress": "0xP", "liquidity": {"usd": 250000.4}}),
            json!({"pairAddress": "0xP", "liquidityUsd": 250000.4}),
            json!({"pairAddress": "0xP", "lockedUsd": "250000.4"}),
        ];
        for shape in &shapes {
            let snapshot = normalize_pair(shape, "dexscreener", &json!({})).unwrap();
            assert_eq!(snapshot.locked_usd_amount, 250_000);
            assert_eq!(snapshot.provider_name, "dexscreener");
            assert!(snapshot.base_token_symbol.is_none());
        }
    }

    #[test]
    fn test_non_finite_liquidity_is_malformed() {
        let pair = json!({"pairAddress": "0xP", "lockedUsd": "NaN"});
        assert!(matches!(
            normalize_pair(&pair, "dexscreener", &json!({})),
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_pair_selected_case_insensitively() {
        let server = MockServer::start().await;
        let body = r#"{"requestId":"req-7","pairs":[
            {"pairAddress":"0xOTHER","liquidity":{"usd":1.0}},
            {"pairAddress":"0xAbCd","liquidity":{"usd":98765.6,"base":42.0,"quote":17.5},
             "baseToken":{"symbol":"PSALE"},"quoteToken":{"symbol":"WETH"}}
        ]}"#;
        mock_pairs(&server, "ethereum", "0xabcd", body).await;

        let snapshot = provider(&server.uri(), false)
            .pair_liquidity("ethereum", "0xabcd")
            .await
            .unwrap();
        assert_eq!(snapshot.locked_usd_amount, 98_766);
        assert_eq!(snapshot.base_token_symbol.as_deref(), Some("PSALE"));
        assert_eq!(snapshot.quote_token_symbol.as_deref(), Some("WETH"));
        assert_eq!(snapshot.liquidity_base_amount, Some(42.0));
        assert_eq!(snapshot.liquidity_quote_amount, Some(17.5));
        assert_eq!(snapshot.provider_request_id.as_deref(), Some("req-7"));
    }

    #[tokio::test]
    async fn test_unmatched_pair_falls_back_to_first_when_enabled() {
        let server = MockServer::start().await;
        let body = r#"{"pairs":[{"pairAddress":"0xFIRST","liquidityUsd":777.0}]}"#;
        mock_pairs(&server, "ethereum", "0xmissing", body).await;

        let snapshot = provider(&server.uri(), true)
            .pair_liquidity("ethereum", "0xmissing")
            .await
            .unwrap();
        assert_eq!(snapshot.locked_usd_amount, 777);
    }

    #[tokio::test]
    async fn test_unmatched_pair_fails_when_strict() {
        let server = MockServer::start().await;
        let body = r#"{"pairs":[{"pairAddress":"0xFIRST","liquidityUsd":777.0}]}"#;
        mock_pairs(&server, "ethereum", "0xmissing", body).await;

        let result = provider(&server.uri(), false)
            .pair_liquidity("ethereum", "0xmissing")
            .await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_single_pair_object_shape() {
        let server = MockServer::start().await;
        let body = r#"{"pair":{"pairAddress":"0xP","lockedUsd":1000}}"#;
        mock_pairs(&server, "bsc", "0xp", body).await;

        let snapshot = provider(&server.uri(), false)
            .pair_liquidity("bsc", "0xp")
            .await
            .unwrap();
        assert_eq!(snapshot.locked_usd_amount, 1000);
    }

    #[tokio::test]
    async fn test_wrong_top_level_shape_is_malformed() {
        let server = MockServer::start().await;
        mock_pairs(&server, "ethereum", "0xp", r#"{"schemaVersion":"1.0.0"}"#).await;

        let result = provider(&server.uri(), true)
            .pair_liquidity("ethereum", "0xp")
            .await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }
}
