//! Compound V2 market history
//!
//! Supply rate of the cUSDC market over the last day, used as the risk-free
//! rate. The rate does not depend on the underlying asset.

use chrono::Utc;
use serde_json::Value;

use super::{json_f64, DataRequest, ProviderSpec};
use crate::types::{Asset, Quantity};

/// cUSDC market on Ethereum mainnet
const CUSDC_MARKET: &str = "0x39AA39c021dfbaE8faC545936693aC917d5E7563";
const WINDOW_SECS: i64 = 86_400;

pub(super) static SPEC: ProviderSpec = ProviderSpec {
    name: "Compound V2",
    quantity: Quantity::Rate,
    base_url: "https://api.compound.finance/api/v2",
    liveness: None,
    request,
    parse,
};

fn request(_asset: Asset) -> DataRequest {
    let now = Utc::now().timestamp();
    DataRequest {
        path: "/market_history/graph".to_string(),
        query: vec![
            ("asset".to_string(), CUSDC_MARKET.to_string()),
            ("min_block_timestamp".to_string(), (now - WINDOW_SECS).to_string()),
            ("max_block_timestamp".to_string(), now.to_string()),
            ("num_buckets".to_string(), "1".to_string()),
        ],
    }
}

fn parse(body: &Value) -> Option<f64> {
    let latest = body.get("supply_rates")?.as_array()?.last()?;
    json_f64(latest.get("rate")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_covers_one_day_in_one_bucket() {
        let req = request(Asset::ETH);
        let value = |key: &str| {
            req.query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        let min: i64 = value("min_block_timestamp").parse().unwrap();
        let max: i64 = value("max_block_timestamp").parse().unwrap();
        assert_eq!(max - min, WINDOW_SECS);
        assert_eq!(value("num_buckets"), "1");
        assert_eq!(value("asset"), CUSDC_MARKET);
    }

    #[test]
    fn parses_latest_supply_rate() {
        let body = json!({
            "supply_rates": [
                {"block_number": 1, "block_timestamp": 1, "rate": 0.0121},
                {"block_number": 2, "block_timestamp": 2, "rate": 0.0134}
            ]
        });
        assert_eq!(parse(&body), Some(0.0134));
        assert_eq!(parse(&json!({"supply_rates": []})), None);
        assert_eq!(parse(&json!({"borrow_rates": []})), None);
    }
}
