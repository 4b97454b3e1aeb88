use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use oraclebot::config::AppConfig;
use oraclebot::ledger::{EthLedgerSubmitter, LedgerSubmitter};
use oraclebot::oracle::{JsonTransport, ReqwestTransport};
use oraclebot::OracleBot;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    oraclebot::logging::init(&config.logging)?;
    info!(config = %config, "oraclebot {} starting", env!("CARGO_PKG_VERSION"));

    config.validate_env()?;

    // Per-call budgets are enforced by the aggregator and pricing adapter
    let http_timeout = config.sources.timeout().max(config.pricing.timeout());
    let transport: Arc<dyn JsonTransport> = Arc::new(ReqwestTransport::new(http_timeout)?);

    let submitter: Option<Arc<dyn LedgerSubmitter>> = if config.bot.submit_enabled {
        let assets = config.bot.assets()?;
        let submitter = EthLedgerSubmitter::connect(&config.ledger, &assets)
            .await
            .context("Failed to connect ledger submitter")?;
        Some(Arc::new(submitter))
    } else {
        info!("Dry-run mode: publications are not submitted");
        None
    };

    let mut bot = OracleBot::connect(&config, transport, submitter)
        .await
        .context("Failed to connect oracle bot")?;

    for asset in bot.assets().to_vec() {
        bot.initialize(asset)
            .await
            .with_context(|| format!("Failed to initialize {}", asset))?;
    }

    tokio::select! {
        result = bot.run_all() => {
            if let Err(e) = result {
                error!(error = %e, "Fatal error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("oraclebot stopped");
    Ok(())
}
