//! Configuration management for OracleBot
//!
//! Loads from optional config files + environment variables via .env

mod types;

pub use types::{Chain, LogFormat};

use anyhow::{bail, Context};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{OracleError, Result};
use crate::oracle::pricing::{HOSTED_PRICING_URL, LOCAL_PRICING_URL};
use crate::oracle::sources::Provider;
use crate::types::Asset;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub sources: SourcesConfig,
    pub pricing: PricingConfig,
    pub ledger: LedgerConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Assets to publish
    pub assets: Vec<String>,
    /// Seconds between read cycles; also the quote cache TTL
    pub read_rate_secs: u64,
    /// Heartbeat: seconds after which a snapshot is republished regardless of movement
    pub post_rate_secs: u64,
    /// Relative spot move that forces a publish (0.01 = 1%)
    pub max_move_fraction: f64,
    /// Send publications to the ledger; false is dry-run
    pub submit_enabled: bool,
    /// Suppress heartbeats once spot has had no live reading for this long (0 disables)
    pub max_staleness_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Spot price providers
    pub spot: Vec<String>,
    /// Interest rate providers
    pub rate: Vec<String>,
    /// Per-source fetch budget in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    /// Overrides the chain's default pricing backend
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub chain: Chain,
    /// Overrides the chain's default RPC endpoint
    pub rpc_url: Option<String>,
    /// Oracle contract address per asset symbol
    #[serde(default)]
    pub contracts: HashMap<String, String>,
    /// Extra attempts after a failed submission
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub confirmations: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory
    pub data_dir: String,
    /// Enable CSV publication journal
    pub csv_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::defaults_builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (ORACLEBOT__*)
            .add_source(
                Environment::with_prefix("ORACLEBOT")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("bot.assets")
                    .with_list_parse_key("sources.spot")
                    .with_list_parse_key("sources.rate"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Built-in defaults only, ignoring files and environment
    pub fn defaults() -> anyhow::Result<Self> {
        Self::defaults_builder()?
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn defaults_builder() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            // Bot defaults
            .set_default("bot.assets", vec!["ETH"])?
            .set_default("bot.read_rate_secs", 5)?
            .set_default("bot.post_rate_secs", 60)?
            .set_default("bot.max_move_fraction", 0.01)?
            .set_default("bot.submit_enabled", false)?
            .set_default("bot.max_staleness_secs", 600)?
            // Source defaults
            .set_default("sources.spot", vec!["binance", "bitfinex"])?
            .set_default("sources.rate", vec!["compound_v2"])?
            .set_default("sources.timeout_ms", 5000)?
            // Pricing defaults
            .set_default("pricing.timeout_ms", 10000)?
            // Ledger defaults
            .set_default("ledger.chain", "local")?
            .set_default("ledger.retries", 2)?
            .set_default("ledger.retry_backoff_ms", 2000)?
            .set_default("ledger.confirmations", 1)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "assets={:?} read={}s post={}s max_move={:.2}% submit={} chain={} spot={:?} rate={:?} staleness={}s",
            self.bot.assets,
            self.bot.read_rate_secs,
            self.bot.post_rate_secs,
            self.bot.max_move_fraction * 100.0,
            self.bot.submit_enabled,
            self.ledger.chain,
            self.sources.spot,
            self.sources.rate,
            self.bot.max_staleness_secs,
        )
    }

    /// Validate required environment variables
    pub fn validate_env(&self) -> anyhow::Result<()> {
        if !self.bot.submit_enabled {
            return Ok(());
        }

        let pk = std::env::var("ORACLE_PRIVATE_KEY")
            .context("Required environment variable ORACLE_PRIVATE_KEY is not set")?;
        if !pk.starts_with("0x") || pk.len() != 66 {
            bail!("ORACLE_PRIVATE_KEY must be a hex string with 0x prefix (66 chars total)");
        }

        if self.ledger.rpc_url.is_none() {
            if let Some(var) = self.ledger.chain.alchemy_key_var() {
                if std::env::var(var).is_err() {
                    bail!("Required environment variable {} is not set", var);
                }
            }
        }

        Ok(())
    }

    /// Pricing backend for the configured chain unless overridden
    pub fn pricing_base_url(&self) -> String {
        match (&self.pricing.base_url, self.ledger.chain) {
            (Some(url), _) => url.clone(),
            (None, Chain::Local) => LOCAL_PRICING_URL.to_string(),
            (None, _) => HOSTED_PRICING_URL.to_string(),
        }
    }
}

impl BotConfig {
    pub fn assets(&self) -> Result<Vec<Asset>> {
        let mut assets = Vec::with_capacity(self.assets.len());
        for name in &self.assets {
            let asset = Asset::from_str(name)
                .ok_or_else(|| OracleError::Config(format!("unsupported asset '{}'", name)))?;
            if !assets.contains(&asset) {
                assets.push(asset);
            }
        }
        if assets.is_empty() {
            return Err(OracleError::Config("bot.assets is empty".to_string()));
        }
        Ok(assets)
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_secs(self.read_rate_secs)
    }

    pub fn post_interval(&self) -> Duration {
        Duration::from_secs(self.post_rate_secs)
    }

    /// `None` when the ceiling is disabled
    pub fn max_staleness(&self) -> Option<Duration> {
        (self.max_staleness_secs > 0).then(|| Duration::from_secs(self.max_staleness_secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_rate_secs == 0 {
            return Err(OracleError::Config("bot.read_rate_secs must be positive".to_string()));
        }
        if !(self.max_move_fraction.is_finite() && self.max_move_fraction > 0.0) {
            return Err(OracleError::Config(format!(
                "bot.max_move_fraction must be positive, got {}",
                self.max_move_fraction
            )));
        }
        Ok(())
    }
}

impl SourcesConfig {
    pub fn spot_providers(&self) -> Result<Vec<Provider>> {
        parse_providers(&self.spot)
    }

    pub fn rate_providers(&self) -> Result<Vec<Provider>> {
        parse_providers(&self.rate)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_providers(names: &[String]) -> Result<Vec<Provider>> {
    names
        .iter()
        .map(|name| {
            Provider::from_str(name)
                .ok_or_else(|| OracleError::Config(format!("unknown provider '{}'", name)))
        })
        .collect()
}

impl PricingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LedgerConfig {
    /// RPC endpoint: explicit override, local node, or Alchemy for hosted chains
    pub fn resolve_rpc_url(&self) -> Result<String> {
        if let Some(url) = &self.rpc_url {
            return Ok(url.clone());
        }
        let Some(var) = self.chain.alchemy_key_var() else {
            return Ok("http://127.0.0.1:8545".to_string());
        };
        let key = std::env::var(var)
            .map_err(|_| OracleError::Config(format!("{} is not set", var)))?;
        let network = match self.chain {
            Chain::Test => "arb-goerli",
            _ => "arb-mainnet",
        };
        Ok(format!("https://{}.g.alchemy.com/v2/{}", network, key))
    }

    /// Contract address for `asset`; ETH falls back to ORACLE_CONTRACT
    pub fn contract_for(&self, asset: Asset) -> Option<String> {
        self.contracts
            .iter()
            .find(|(symbol, _)| Asset::from_str(symbol) == Some(asset))
            .map(|(_, address)| address.clone())
            .or_else(|| match asset {
                Asset::ETH => std::env::var("ORACLE_CONTRACT").ok(),
                _ => None,
            })
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
