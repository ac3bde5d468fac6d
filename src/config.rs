use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExplorerConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        ExplorerConfig {
            base_url: "https://api.etherscan.io".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LiquidityConfig {
    pub base_url: String,
    pub pair_address: String,
    #[serde(default = "default_network")]
    pub network: String,
    /// Best-effort selection: serve the first pair of the response when the
    /// configured address is absent from it. Matches the historical
    /// behavior; set to false for strict matching.
    #[serde(default = "default_true")]
    pub fallback_to_first_pair: bool,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        LiquidityConfig {
            base_url: "https://api.dexscreener.com".to_string(),
            pair_address: String::new(),
            network: default_network(),
            fallback_to_first_pair: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PriceConfig {
    pub base_url: String,
    pub token_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts per upstream call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Shorter window for degraded aggregates so a partial outage is
    /// re-probed sooner.
    #[serde(default = "default_degraded_ttl_secs")]
    pub degraded_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_ttl_secs(),
            degraded_ttl_secs: default_degraded_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn degraded_ttl(&self) -> Duration {
        Duration::from_secs(self.degraded_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Presale wallet whose balance and inbound transfers are aggregated.
    pub wallet_address: String,
    /// Fixed native→USD rate used when no price upstream is configured or
    /// the price leg fails.
    pub conversion_rate: f64,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub liquidity: LiquidityConfig,
    /// Optional live spot-price upstream.
    #[serde(default)]
    pub price: Option<PriceConfig>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_network() -> String {
    "ethereum".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    300
}

fn default_ttl_secs() -> u64 {
    30
}

fn default_degraded_ttl_secs() -> u64 {
    5
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "prestat", "prestat")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
