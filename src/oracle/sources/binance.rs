//! Binance spot ticker
//!
//! `GET /api/v3/ticker/price?symbol=ETHUSDC` returns `{"symbol": "...", "price": "1850.25"}`.

use serde_json::Value;

use super::{json_f64, DataRequest, Liveness, ProviderSpec};
use crate::types::{Asset, Quantity};

pub(super) static SPEC: ProviderSpec = ProviderSpec {
    name: "Binance",
    quantity: Quantity::Price,
    base_url: "https://api.binance.com",
    liveness: Some(Liveness {
        path: "/api/v3/ping",
        check: ping_ok,
    }),
    request,
    parse,
};

fn request(asset: Asset) -> DataRequest {
    DataRequest {
        path: "/api/v3/ticker/price".to_string(),
        query: vec![("symbol".to_string(), format!("{}USDC", asset.symbol()))],
    }
}

fn parse(body: &Value) -> Option<f64> {
    json_f64(body.get("price")?)
}

// Ping answers `{}`; reaching a 2xx is the whole check.
fn ping_ok(_body: &Value) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_targets_usdc_pair() {
        let req = request(Asset::ETH);
        assert_eq!(req.path, "/api/v3/ticker/price");
        assert_eq!(req.query, vec![("symbol".to_string(), "ETHUSDC".to_string())]);
    }

    #[test]
    fn parses_string_price() {
        assert_eq!(parse(&json!({"symbol": "ETHUSDC", "price": "1850.25000000"})), Some(1850.25));
        assert_eq!(parse(&json!({"code": -1121, "msg": "Invalid symbol."})), None);
        assert_eq!(parse(&json!({"price": "n/a"})), None);
    }
}
