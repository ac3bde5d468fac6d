use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use prestat::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for prestat::AppCommand {
    fn from(cmd: Commands) -> prestat::AppCommand {
        match cmd {
            Commands::Stats => prestat::AppCommand::Stats,
            Commands::Transactions { limit } => prestat::AppCommand::Transactions { limit },
            Commands::Verify { hash } => prestat::AppCommand::Verify { hash },
            Commands::Liquidity => prestat::AppCommand::Liquidity,
            Commands::Price => prestat::AppCommand::Price,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display aggregated presale stats
    Stats,
    /// Display recent inbound transactions
    Transactions {
        /// Maximum number of transactions to return
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Verify a transaction by hash
    Verify { hash: String },
    /// Display locked liquidity for the configured pair
    Liquidity,
    /// Display the spot USD price for the configured token
    Price,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => prestat::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = prestat::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
wallet_address: "0x0000000000000000000000000000000000000000"
conversion_rate: 3000.0

explorer:
  base_url: "https://api.etherscan.io"

liquidity:
  base_url: "https://api.dexscreener.com"
  pair_address: "0x0000000000000000000000000000000000000000"
  network: "ethereum"
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
