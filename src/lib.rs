pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod log;
pub mod normalize;
pub mod providers;
pub mod records;
pub mod retry;
pub mod stats;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StatsError;
use crate::records::Aggregated;
use crate::stats::StatsService;

pub enum AppCommand {
    Stats,
    Transactions { limit: usize },
    Verify { hash: String },
    Liquidity,
    Price,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Presale stats aggregator starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let service = StatsService::from_config(config)?;

    let output = match command {
        AppCommand::Stats => render(service.get_presale_stats().await)?,
        AppCommand::Transactions { limit } => render(service.get_recent_transactions(limit).await)?,
        AppCommand::Verify { hash } => render(service.verify_transaction(&hash).await)?,
        AppCommand::Liquidity => render(service.get_liquidity().await)?,
        AppCommand::Price => render(service.get_spot_price().await)?,
    };
    println!("{output}");
    Ok(())
}

/// Serializes the aggregate, or emits the structured error body (with its
/// Retry-After hint) before failing the command.
fn render<T: Serialize>(result: Result<Aggregated<T>, StatsError>) -> Result<String> {
    match result {
        Ok(value) => Ok(serde_json::to_string_pretty(&value)?),
        Err(err) => {
            eprintln!("{}", serde_json::to_string_pretty(&err)?);
            Err(err.into())
        }
    }
}
