//! Quote source implementations (Binance, FTX, Bitfinex, Compound V2)
//!
//! Each provider module exposes a [`ProviderSpec`]: its endpoint, payload
//! parser and optional liveness probe. [`QuoteSource`] wraps one provider
//! with a per-asset TTL cache.

mod binance;
mod bitfinex;
mod compound;
mod ftx;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{OracleError, Result};
use crate::oracle::transport::JsonTransport;
use crate::types::{Asset, Quantity};

/// External quote provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    Binance,
    Ftx,
    Bitfinex,
    CompoundV2,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Binance,
        Provider::Ftx,
        Provider::Bitfinex,
        Provider::CompoundV2,
    ];

    /// Static endpoint/parser table entry for this provider
    pub fn spec(&self) -> &'static ProviderSpec {
        match self {
            Provider::Binance => &binance::SPEC,
            Provider::Ftx => &ftx::SPEC,
            Provider::Bitfinex => &bitfinex::SPEC,
            Provider::CompoundV2 => &compound::SPEC,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    pub fn quantity(&self) -> Quantity {
        self.spec().quantity
    }

    /// Parse from config string (e.g. "binance", "compound_v2")
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "binance" => Some(Provider::Binance),
            "ftx" => Some(Provider::Ftx),
            "bitfinex" => Some(Provider::Bitfinex),
            "compound_v2" | "compound" => Some(Provider::CompoundV2),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Path and query of one live data request
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
}

/// Liveness probe run once when a source is constructed
#[derive(Debug)]
pub struct Liveness {
    pub path: &'static str,
    /// Judges the 2xx body; a transport failure already fails the probe
    pub check: fn(&Value) -> bool,
}

/// Per-provider dispatch table entry
#[derive(Debug)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub quantity: Quantity,
    pub base_url: &'static str,
    pub liveness: Option<Liveness>,
    pub request: fn(Asset) -> DataRequest,
    pub parse: fn(&Value) -> Option<f64>,
}

/// Read a JSON number or numeric string as a finite f64
pub(crate) fn json_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: f64,
    fetched_at: Instant,
}

/// One provider plus its TTL cache
pub struct QuoteSource {
    provider: Provider,
    ttl: Duration,
    transport: Arc<dyn JsonTransport>,
    cache: HashMap<Asset, CacheEntry>,
}

impl QuoteSource {
    /// Build a source after its provider passes the liveness probe
    pub async fn connect(
        provider: Provider,
        ttl: Duration,
        transport: Arc<dyn JsonTransport>,
    ) -> Result<Self> {
        let source = Self::new(provider, ttl, transport);
        source.check_liveness().await?;
        info!(provider = %provider, ttl_secs = ttl.as_secs(), "✅ Quote source live");
        Ok(source)
    }

    pub(crate) fn new(provider: Provider, ttl: Duration, transport: Arc<dyn JsonTransport>) -> Self {
        Self {
            provider,
            ttl,
            transport,
            cache: HashMap::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn quantity(&self) -> Quantity {
        self.provider.quantity()
    }

    /// Last cached value for an asset, however old
    pub fn cached(&self, asset: Asset) -> Option<f64> {
        self.cache.get(&asset).map(|entry| entry.value)
    }

    async fn check_liveness(&self) -> Result<()> {
        let spec = self.provider.spec();
        let Some(liveness) = &spec.liveness else {
            return Ok(());
        };

        let url = format!("{}{}", spec.base_url, liveness.path);
        let body = self
            .transport
            .get_json(&url, &[])
            .await
            .map_err(|e| OracleError::SourceOffline {
                provider: spec.name,
                reason: e.to_string(),
            })?;

        if (liveness.check)(&body) {
            Ok(())
        } else {
            Err(OracleError::SourceOffline {
                provider: spec.name,
                reason: format!("unexpected status payload: {}", body),
            })
        }
    }

    /// Current value for `asset`, served from cache while it is younger than the TTL
    pub async fn fetch(&mut self, asset: Asset) -> Result<f64> {
        if let Some(entry) = self.cache.get(&asset) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.value);
            }
        }

        let spec = self.provider.spec();
        let request = (spec.request)(asset);
        let url = format!("{}{}", spec.base_url, request.path);

        let body = self
            .transport
            .get_json(&url, &request.query)
            .await
            .map_err(|e| unavailable(spec.name, e.to_string()))?;

        let value = (spec.parse)(&body)
            .ok_or_else(|| unavailable(spec.name, format!("unparseable {} payload", asset)))?;
        if spec.quantity == Quantity::Price && value <= 0.0 {
            return Err(unavailable(spec.name, format!("non-positive {} price {}", asset, value)));
        }

        debug!(provider = %spec.name, asset = %asset, value, "Live quote");
        self.cache.insert(
            asset,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
        Ok(value)
    }
}

impl fmt::Debug for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuoteSource")
            .field("provider", &self.provider)
            .field("ttl", &self.ttl)
            .field("cached_assets", &self.cache.len())
            .finish()
    }
}

fn unavailable(provider: &'static str, reason: String) -> OracleError {
    OracleError::SourceUnavailable { provider, reason }
}
