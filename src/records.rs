//! Canonical, provider-agnostic result shapes returned to consumers.
//!
//! Every numeric field is either a finite number or an explicit null; a
//! missing upstream figure is a valid normalized state, not an error.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregated presale figures for the configured wallet.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresaleStats {
    /// Exact native-unit balance as a decimal string (e.g. "1.5").
    pub total_native_amount: String,
    /// USD value, rounded to a whole amount.
    pub total_usd_amount: i64,
    pub contributor_count: u64,
    pub last_updated_at: DateTime<Utc>,
}

impl PresaleStats {
    /// Zero default served only through degraded paths, never as a fresh
    /// fetched value.
    pub fn placeholder() -> Self {
        Self {
            total_native_amount: "0".to_string(),
            total_usd_amount: 0,
            contributor_count: 0,
            last_updated_at: Utc::now(),
        }
    }
}

/// Locked-liquidity snapshot for one trading pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiquiditySnapshot {
    pub locked_usd_amount: i64,
    pub provider_name: String,
    pub base_token_symbol: Option<String>,
    pub quote_token_symbol: Option<String>,
    pub liquidity_base_amount: Option<f64>,
    pub liquidity_quote_amount: Option<f64>,
    pub provider_request_id: Option<String>,
}

/// One normalized inbound transaction.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: String,
    pub from_address: String,
    /// Native-unit value as a decimal string.
    pub value_native_amount: String,
    pub timestamp: DateTime<Utc>,
}

/// Receipt-status lookup result. A pending or unknown transaction is a
/// successful lookup with `found: false`, not an error.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedTransaction {
    pub hash: String,
    pub found: bool,
    pub succeeded: Option<bool>,
}

/// Spot USD price for the configured token.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpotPrice {
    pub token_id: String,
    pub usd: f64,
}

/// A canonical record plus the cache-control metadata the serving layer
/// needs to set freshness headers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Aggregated<T> {
    pub data: T,
    /// True when some sub-fetch failed and a documented default or stale
    /// value stands in for the missing figure.
    pub degraded: bool,
    pub max_age_secs: u64,
}

impl<T> Aggregated<T> {
    pub fn fresh(data: T, max_age_secs: u64) -> Self {
        Self {
            data,
            degraded: false,
            max_age_secs,
        }
    }

    pub fn degraded(data: T, max_age_secs: u64) -> Self {
        Self {
            data,
            degraded: true,
            max_age_secs,
        }
    }
}
