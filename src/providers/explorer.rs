use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::normalize::{coerce_u64, probe, probe_str};
use crate::providers::{ChainExplorer, NativeBalance, Upstream};
use crate::records::{TransactionRecord, VerifiedTransaction};

const NATIVE_DECIMALS: u32 = 18;

/// Etherscan-style account API: `?module=account&action=...` with results
/// wrapped in `{ "status": "1", "result": ... }` and all numbers as decimal
/// strings.
pub struct ExplorerProvider {
    base_url: String,
    api_key: Option<String>,
    upstream: Upstream,
}

impl ExplorerProvider {
    pub fn new(base_url: &str, api_key: Option<String>, upstream: Upstream) -> Self {
        ExplorerProvider {
            base_url: base_url.to_string(),
            api_key,
            upstream,
        }
    }

    async fn query(&self, action_params: &str) -> Result<Value, FetchError> {
        let url = format!("{}/api?module=account&{}", self.base_url, action_params);
        debug!("Requesting explorer data from {}", url);
        let payload = self.upstream.get_json(&url, self.api_key.as_deref()).await?;

        // The explorer signals soft errors in-band with status "0".
        if let Some(status) = probe_str(&payload, &["status"]) {
            if status != "1" {
                let message = probe_str(&payload, &["message", "result"]).unwrap_or("unknown");
                return Err(FetchError::Malformed(format!(
                    "explorer rejected the query: {message}"
                )));
            }
        }
        Ok(payload)
    }
}

#[async_trait]
impl ChainExplorer for ExplorerProvider {
    async fn native_balance(&self, address: &str) -> Result<NativeBalance, FetchError> {
        let payload = self
            .query(&format!("action=balance&address={address}&tag=latest"))
            .await?;

        let raw = probe(&payload, &["result"])
            .ok_or_else(|| FetchError::Malformed("balance response missing result".into()))?;
        let wei = raw
            .as_str()
            .map(str::to_string)
            .or_else(|| raw.as_u64().map(|n| n.to_string()))
            .ok_or_else(|| FetchError::Malformed(format!("unexpected balance result: {raw}")))?;

        let amount = base_units_to_decimal(&wei, NATIVE_DECIMALS)?;
        let approx = amount
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| FetchError::Malformed(format!("balance out of range: {wei}")))?;
        Ok(NativeBalance { amount, approx })
    }

    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, FetchError> {
        let payload = self
            .query(&format!(
                "action=txlist&address={address}&startblock=0&endblock=99999999&sort=desc"
            ))
            .await?;

        let items = probe(&payload, &["result"])
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Malformed("txlist response missing result array".into()))?;

        // Individual malformed entries are dropped rather than failing the
        // whole list.
        let mut transactions = Vec::new();
        for item in items {
            if transactions.len() >= limit {
                break;
            }
            match normalize_transaction(item) {
                Ok(tx) => transactions.push(tx),
                Err(e) => debug!("Skipping malformed transaction entry: {e}"),
            }
        }
        Ok(transactions)
    }

    async fn receipt_status(&self, hash: &str) -> Result<VerifiedTransaction, FetchError> {
        let url = format!(
            "{}/api?module=transaction&action=gettxreceiptstatus&txhash={hash}",
            self.base_url
        );
        debug!("Requesting receipt status from {}", url);
        let payload = self.upstream.get_json(&url, self.api_key.as_deref()).await?;

        let status = probe_str(&payload, &["result.status"]);
        Ok(match status {
            Some("1") => VerifiedTransaction {
                hash: hash.to_string(),
                found: true,
                succeeded: Some(true),
            },
            Some("0") => VerifiedTransaction {
                hash: hash.to_string(),
                found: true,
                succeeded: Some(false),
            },
            // Empty status or missing result: the transaction is pending or
            // unknown to the explorer.
            _ => VerifiedTransaction {
                hash: hash.to_string(),
                found: false,
                succeeded: None,
            },
        })
    }
}

fn normalize_transaction(item: &Value) -> Result<TransactionRecord, FetchError> {
    let hash = probe_str(item, &["hash"])
        .ok_or_else(|| FetchError::Malformed("transaction missing hash".into()))?;
    let from = probe_str(item, &["from"])
        .ok_or_else(|| FetchError::Malformed("transaction missing sender".into()))?;
    let value = probe_str(item, &["value"]).unwrap_or("0");
    let timestamp = probe(item, &["timeStamp", "timestamp"])
        .map(coerce_u64)
        .transpose()?
        .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
        .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);

    Ok(TransactionRecord {
        hash: hash.to_string(),
        from_address: from.to_string(),
        value_native_amount: base_units_to_decimal(value, NATIVE_DECIMALS)?,
        timestamp,
    })
}

/// Converts a base-unit (wei) decimal string into an exact native-unit
/// decimal string. Integer arithmetic only; trailing zeros are trimmed.
fn base_units_to_decimal(raw: &str, decimals: u32) -> Result<String, FetchError> {
    let units = raw
        .trim()
        .parse::<u128>()
        .map_err(|_| FetchError::Malformed(format!("invalid base-unit amount: '{raw}'")))?;
    let scale = 10u128.pow(decimals);
    let whole = units / scale;
    let frac = units % scale;
    if frac == 0 {
        return Ok(whole.to_string());
    }
    let frac = format!("{frac:0width$}", width = decimals as usize);
    Ok(format!("{whole}.{}", frac.trim_end_matches('0')))
}
