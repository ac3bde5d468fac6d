//! Query-level aggregation over the upstream providers.
//!
//! Each operation checks the shared TTL cache, fans out the independent
//! sub-fetches concurrently on a miss, normalizes and combines the results,
//! and caches the outcome. Partial upstream failure degrades individual
//! fields instead of failing the whole aggregate; only a total failure with
//! no warmed prior entry surfaces as an error. Dropping the returned future
//! (caller gave up) cancels any in-flight attempts with it.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::error::{FetchError, StatsError};
use crate::fetch::HttpFetcher;
use crate::providers::explorer::ExplorerProvider;
use crate::providers::liquidity::PairLiquidityProvider;
use crate::providers::price::SimplePriceProvider;
use crate::providers::{ChainExplorer, LiquiditySource, SpotPriceSource, Upstream};
use crate::records::{
    Aggregated, LiquiditySnapshot, PresaleStats, SpotPrice, TransactionRecord, VerifiedTransaction,
};
use crate::retry::RetryPolicy;

/// How many recent transactions are scanned when counting contributors.
const CONTRIBUTOR_SCAN_LIMIT: usize = 10_000;

pub struct StatsService {
    config: AppConfig,
    explorer: Arc<dyn ChainExplorer>,
    liquidity: Arc<dyn LiquiditySource>,
    price: Option<Arc<dyn SpotPriceSource>>,
    stats_cache: TtlCache<Aggregated<PresaleStats>>,
    tx_cache: TtlCache<Aggregated<Vec<TransactionRecord>>>,
    liquidity_cache: TtlCache<Aggregated<LiquiditySnapshot>>,
    receipt_cache: TtlCache<Aggregated<VerifiedTransaction>>,
    price_cache: TtlCache<Aggregated<SpotPrice>>,
}

impl StatsService {
    /// Builds the service with real HTTP providers from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.http.timeout())
            .map_err(|e| anyhow::anyhow!("failed to set up HTTP client: {e}"))?;
        let policy = RetryPolicy::new(config.http.max_attempts, config.http.backoff_base());
        let upstream = Upstream::new(fetcher, policy);

        let explorer: Arc<dyn ChainExplorer> = Arc::new(ExplorerProvider::new(
            &config.explorer.base_url,
            config.explorer.api_key.clone(),
            upstream.clone(),
        ));
        let liquidity: Arc<dyn LiquiditySource> = Arc::new(PairLiquidityProvider::new(
            &config.liquidity.base_url,
            config.liquidity.fallback_to_first_pair,
            upstream.clone(),
        ));
        let price: Option<Arc<dyn SpotPriceSource>> = config
            .price
            .as_ref()
            .map(|p| {
                Arc::new(SimplePriceProvider::new(&p.base_url, upstream.clone()))
                    as Arc<dyn SpotPriceSource>
            });

        Ok(Self::with_providers(config, explorer, liquidity, price))
    }

    /// Seam for tests and alternative provider wiring.
    pub fn with_providers(
        config: AppConfig,
        explorer: Arc<dyn ChainExplorer>,
        liquidity: Arc<dyn LiquiditySource>,
        price: Option<Arc<dyn SpotPriceSource>>,
    ) -> Self {
        let ttl = config.cache.ttl();
        Self {
            explorer,
            liquidity,
            price,
            stats_cache: TtlCache::new(ttl),
            tx_cache: TtlCache::new(ttl),
            liquidity_cache: TtlCache::new(ttl),
            receipt_cache: TtlCache::new(ttl),
            price_cache: TtlCache::new(ttl),
            config,
        }
    }

    /// Wallet balance and contributor count, fetched concurrently and
    /// combined into the presale aggregate.
    pub async fn get_presale_stats(&self) -> Result<Aggregated<PresaleStats>, StatsError> {
        let wallet = self.config.wallet_address.clone();
        let key = format!("presale:{wallet}");
        if let Some(hit) = cached_hit(&self.stats_cache, &key).await {
            return Ok(hit);
        }

        let (balance, transactions) = futures::join!(
            self.explorer.native_balance(&wallet),
            self.explorer
                .recent_transactions(&wallet, CONTRIBUTOR_SCAN_LIMIT),
        );

        let ttl_secs = self.config.cache.ttl_secs;
        let degraded_secs = self.config.cache.degraded_ttl_secs;

        match (balance, transactions) {
            (Ok(balance), Ok(txs)) => {
                let rate = self.conversion_rate().await;
                let stats = PresaleStats {
                    total_usd_amount: (balance.approx * rate).round() as i64,
                    total_native_amount: balance.amount,
                    contributor_count: count_contributors(&txs),
                    last_updated_at: Utc::now(),
                };
                let result = Aggregated::fresh(stats, ttl_secs);
                self.stats_cache.put(&key, result.clone()).await;
                Ok(result)
            }
            (Ok(balance), Err(e)) => {
                warn!("Transaction list fetch failed, degrading contributor count: {e}");
                let rate = self.conversion_rate().await;
                let stats = PresaleStats {
                    total_usd_amount: (balance.approx * rate).round() as i64,
                    total_native_amount: balance.amount,
                    contributor_count: 0,
                    last_updated_at: Utc::now(),
                };
                let result = Aggregated::degraded(stats, degraded_secs);
                self.stats_cache
                    .put_with_ttl(&key, result.clone(), self.config.cache.degraded_ttl())
                    .await;
                Ok(result)
            }
            (Err(e), Ok(txs)) => {
                warn!("Balance fetch failed, degrading totals to zero: {e}");
                let stats = PresaleStats {
                    contributor_count: count_contributors(&txs),
                    ..PresaleStats::placeholder()
                };
                let result = Aggregated::degraded(stats, degraded_secs);
                // A zero total from a failed balance leg must never be
                // replayed as a fresh zero. The unwarmed write is not
                // readable through any lookup; it only marks the key until a
                // real fetch supersedes it, and it never clobbers a warmed
                // stale entry the total-failure fallback may still need.
                self.stats_cache.put_placeholder(&key, result.clone()).await;
                Ok(result)
            }
            (Err(e), Err(tx_err)) => {
                debug!("All presale sub-fetches failed: {e}; {tx_err}");
                self.stale_or_error(&self.stats_cache, &key, &e).await
            }
        }
    }

    /// Recent normalized inbound transactions for the presale wallet.
    pub async fn get_recent_transactions(
        &self,
        limit: usize,
    ) -> Result<Aggregated<Vec<TransactionRecord>>, StatsError> {
        let wallet = self.config.wallet_address.clone();
        let key = format!("txs:{wallet}:{limit}");
        if let Some(hit) = cached_hit(&self.tx_cache, &key).await {
            return Ok(hit);
        }

        match self.explorer.recent_transactions(&wallet, limit).await {
            Ok(txs) => {
                let result = Aggregated::fresh(txs, self.config.cache.ttl_secs);
                self.tx_cache.put(&key, result.clone()).await;
                Ok(result)
            }
            Err(e) => self.stale_or_error(&self.tx_cache, &key, &e).await,
        }
    }

    /// Receipt-status lookup. Confirmed receipts are cached; a pending or
    /// unknown transaction is served uncached so the next call re-checks.
    pub async fn verify_transaction(
        &self,
        hash: &str,
    ) -> Result<Aggregated<VerifiedTransaction>, StatsError> {
        let key = format!("receipt:{hash}");
        if let Some(hit) = cached_hit(&self.receipt_cache, &key).await {
            return Ok(hit);
        }

        match self.explorer.receipt_status(hash).await {
            Ok(receipt) => {
                let result = Aggregated::fresh(receipt, self.config.cache.ttl_secs);
                if result.data.found {
                    self.receipt_cache.put(&key, result.clone()).await;
                }
                Ok(result)
            }
            Err(e) => self.stale_or_error(&self.receipt_cache, &key, &e).await,
        }
    }

    /// Locked liquidity for the configured pair.
    pub async fn get_liquidity(&self) -> Result<Aggregated<LiquiditySnapshot>, StatsError> {
        let network = self.config.liquidity.network.clone();
        let pair = self.config.liquidity.pair_address.clone();
        let key = format!("liq:{network}:{pair}");
        if let Some(hit) = cached_hit(&self.liquidity_cache, &key).await {
            return Ok(hit);
        }

        match self.liquidity.pair_liquidity(&network, &pair).await {
            Ok(snapshot) => {
                let result = Aggregated::fresh(snapshot, self.config.cache.ttl_secs);
                self.liquidity_cache.put(&key, result.clone()).await;
                Ok(result)
            }
            Err(e) => self.stale_or_error(&self.liquidity_cache, &key, &e).await,
        }
    }

    /// Spot USD price for the configured token, when a price upstream is
    /// configured.
    pub async fn get_spot_price(&self) -> Result<Aggregated<SpotPrice>, StatsError> {
        let (Some(price_config), Some(source)) = (self.config.price.as_ref(), self.price.as_ref())
        else {
            return Err(StatsError {
                error: "price_upstream_not_configured".to_string(),
                status: 501,
                details: None,
                retry_after: None,
            });
        };
        let token_id = price_config.token_id.clone();
        let key = format!("price:{token_id}");
        if let Some(hit) = cached_hit(&self.price_cache, &key).await {
            return Ok(hit);
        }

        match source.spot_usd(&token_id).await {
            Ok(usd) => {
                let result = Aggregated::fresh(
                    SpotPrice { token_id, usd },
                    self.config.cache.ttl_secs,
                );
                self.price_cache.put(&key, result.clone()).await;
                Ok(result)
            }
            Err(e) => self.stale_or_error(&self.price_cache, &key, &e).await,
        }
    }

    /// Native→USD rate: live spot price when available, fixed configured
    /// rate otherwise. The rate is advisory, so a failed price leg falls
    /// back silently instead of degrading the aggregate.
    async fn conversion_rate(&self) -> f64 {
        if self.price.is_some() {
            match self.get_spot_price().await {
                Ok(price) => return price.data.usd,
                Err(e) => {
                    warn!(
                        "Spot price unavailable ({e}), using fixed conversion rate {}",
                        self.config.conversion_rate
                    );
                }
            }
        }
        self.config.conversion_rate
    }

    /// Total-failure policy: serve a warmed entry at any age tagged
    /// degraded, except for `Malformed` (a provider contract change is
    /// surfaced immediately, not papered over). Otherwise the structured
    /// error reaches the consumer and nothing is cached, so the next
    /// request retries fully.
    async fn stale_or_error<T: Clone + Send + Sync>(
        &self,
        cache: &TtlCache<Aggregated<T>>,
        key: &str,
        err: &FetchError,
    ) -> Result<Aggregated<T>, StatsError> {
        if !matches!(err, FetchError::Malformed(_)) {
            if let Some(mut prior) = cache.get_stale(key).await {
                warn!("Upstream failed ({err}), serving stale cache entry for {key}");
                prior.degraded = true;
                prior.max_age_secs = self.config.cache.degraded_ttl_secs;
                return Ok(prior);
            }
        }
        Err(StatsError::from_fetch(err))
    }
}

/// Cache lookup that rewrites `max_age_secs` to the entry's remaining
/// lifetime, so a consumer hitting late in the TTL window is not told the
/// value is good for a full window again.
async fn cached_hit<T: Clone + Send + Sync>(
    cache: &TtlCache<Aggregated<T>>,
    key: &str,
) -> Option<Aggregated<T>> {
    let (mut hit, remaining) = cache.get(key).await?;
    hit.max_age_secs = remaining.as_secs();
    Some(hit)
}

/// Distinct sending addresses, case-insensitive.
fn count_contributors(txs: &[TransactionRecord]) -> u64 {
    txs.iter()
        .map(|tx| tx.from_address.to_lowercase())
        .collect::<HashSet<_>>()
        .len() as u64
}
