//! Ledger submission - posts published snapshots to the oracle contract
//!
//! Snapshots are sent as fixed-point integers: prices scaled by 10^3, the
//! interest rate by 10^6.

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::error::{OracleError, Result};
use crate::types::{Asset, Snapshot, INTEREST_PRECISION, PRICE_PRECISION};

abigen!(
    SpotOracleContract,
    r#"[
        function setLatestPrice(uint256 spotPrice, uint256 interestRate, uint256[] callPrices, uint256[] putPrices)
    ]"#
);

type OracleClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Destination for published snapshots
#[async_trait]
pub trait LedgerSubmitter: Send + Sync {
    /// Post `snapshot` for `asset`. Errors are final; retries happen inside.
    async fn submit(&self, asset: Asset, snapshot: &Snapshot) -> Result<()>;
}

/// Snapshot encoded for `setLatestPrice`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSnapshot {
    pub spot_price: U256,
    pub interest_rate: U256,
    pub call_prices: Vec<U256>,
    pub put_prices: Vec<U256>,
}

impl EncodedSnapshot {
    pub fn encode(snapshot: &Snapshot) -> std::result::Result<Self, String> {
        let prices = |values: &[f64], side: &str| -> std::result::Result<Vec<U256>, String> {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    to_fixed(*v, PRICE_PRECISION)
                        .ok_or_else(|| format!("{}[{}] = {} cannot be encoded", side, i, v))
                })
                .collect()
        };

        Ok(Self {
            spot_price: to_fixed(snapshot.spot_price, PRICE_PRECISION)
                .ok_or_else(|| format!("spot {} cannot be encoded", snapshot.spot_price))?,
            interest_rate: to_fixed(snapshot.interest_rate, INTEREST_PRECISION)
                .ok_or_else(|| format!("rate {} cannot be encoded", snapshot.interest_rate))?,
            call_prices: prices(&snapshot.call_prices, "call")?,
            put_prices: prices(&snapshot.put_prices, "put")?,
        })
    }
}

/// `value × 10^dp` as an unsigned integer; `None` for negative or non-finite input
pub fn to_fixed(value: f64, dp: u32) -> Option<U256> {
    fixed_from_decimal(Decimal::from_f64(value)?, dp)
}

pub fn fixed_from_decimal(value: Decimal, dp: u32) -> Option<U256> {
    let mut scaled = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
    scaled.rescale(dp);
    let mantissa = u128::try_from(scaled.mantissa()).ok()?;
    Some(U256::from(mantissa))
}

/// Run `op` up to `retries + 1` times, sleeping `backoff × attempt` between tries
pub async fn with_retries<T, F, Fut>(
    retries: u32,
    backoff: Duration,
    label: &str,
    mut op: F,
) -> std::result::Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, String>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(reason) if attempt < retries => {
                attempt += 1;
                let delay = backoff * attempt;
                warn!(
                    what = label,
                    attempt,
                    retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %reason,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
            Err(reason) => return Err(reason),
        }
    }
}

/// Submits through a signing JSON-RPC client
pub struct EthLedgerSubmitter {
    client: Arc<OracleClient>,
    contracts: HashMap<Asset, Address>,
    retries: u32,
    backoff: Duration,
    confirmations: usize,
}

impl EthLedgerSubmitter {
    /// Connect to the configured chain and resolve a contract for every asset
    pub async fn connect(config: &LedgerConfig, assets: &[Asset]) -> Result<Self> {
        let rpc_url = config.resolve_rpc_url()?;
        let provider = Provider::<Http>::try_from(rpc_url.as_str())
            .map_err(|e| OracleError::Config(format!("invalid {} RPC url: {}", config.chain, e)))?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| OracleError::Transport(format!("{} RPC unreachable: {}", config.chain, e)))?;

        let private_key = std::env::var("ORACLE_PRIVATE_KEY")
            .map_err(|_| OracleError::Config("ORACLE_PRIVATE_KEY is not set".to_string()))?;
        let wallet: LocalWallet = private_key
            .parse()
            .map_err(|_| OracleError::Config("ORACLE_PRIVATE_KEY is not a valid key".to_string()))?;
        let signer = wallet.with_chain_id(chain_id.as_u64());
        let sender = signer.address();

        let mut contracts = HashMap::new();
        for &asset in assets {
            let raw = config.contract_for(asset).ok_or_else(|| {
                OracleError::Config(format!("no oracle contract configured for {}", asset))
            })?;
            let address: Address = raw.parse().map_err(|_| {
                OracleError::Config(format!("invalid contract address '{}' for {}", raw, asset))
            })?;
            contracts.insert(asset, address);
        }

        info!(
            chain = %config.chain,
            chain_id = chain_id.as_u64(),
            sender = %format!("{:#x}", sender),
            contracts = contracts.len(),
            "🔗 Ledger connected"
        );

        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, signer)),
            contracts,
            retries: config.retries,
            backoff: config.retry_backoff(),
            confirmations: config.confirmations.max(1),
        })
    }

    async fn send_once(&self, address: Address, encoded: &EncodedSnapshot) -> std::result::Result<H256, String> {
        let contract = SpotOracleContract::new(address, self.client.clone());
        let call = contract.set_latest_price(
            encoded.spot_price,
            encoded.interest_rate,
            encoded.call_prices.clone(),
            encoded.put_prices.clone(),
        );

        let pending = call
            .send()
            .await
            .map_err(|e| format!("setLatestPrice not accepted: {}", e))?;
        let tx_hash = pending.tx_hash();
        let receipt = pending
            .confirmations(self.confirmations)
            .await
            .map_err(|e| format!("receipt unavailable for {:#x}: {}", tx_hash, e))?;

        match receipt {
            Some(r) if r.status.map(|s| s.as_u64()) == Some(1) => Ok(tx_hash),
            Some(_) => Err(format!("transaction {:#x} reverted", tx_hash)),
            None => Err(format!("transaction {:#x} dropped before confirmation", tx_hash)),
        }
    }
}

#[async_trait]
impl LedgerSubmitter for EthLedgerSubmitter {
    async fn submit(&self, asset: Asset, snapshot: &Snapshot) -> Result<()> {
        let address = *self.contracts.get(&asset).ok_or_else(|| OracleError::Submission {
            asset,
            reason: "no contract for asset".to_string(),
        })?;
        let encoded = EncodedSnapshot::encode(snapshot)
            .map_err(|reason| OracleError::Submission { asset, reason })?;

        let tx_hash = with_retries(self.retries, self.backoff, "setLatestPrice", || {
            self.send_once(address, &encoded)
        })
        .await
        .map_err(|reason| OracleError::Submission { asset, reason })?;

        info!(
            asset = %asset,
            tx_hash = %format!("{:#x}", tx_hash),
            "Snapshot transaction confirmed"
        );
        Ok(())
    }
}
