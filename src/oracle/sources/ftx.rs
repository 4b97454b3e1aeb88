//! FTX market endpoint
//!
//! `GET /markets/ETH/USD` returns `{"success": true, "result": {"price": 1850.2, ...}}`.

use serde_json::Value;

use super::{json_f64, DataRequest, ProviderSpec};
use crate::types::{Asset, Quantity};

pub(super) static SPEC: ProviderSpec = ProviderSpec {
    name: "FTX",
    quantity: Quantity::Price,
    base_url: "https://ftx.com/api",
    liveness: None,
    request,
    parse,
};

fn request(asset: Asset) -> DataRequest {
    DataRequest {
        path: format!("/markets/{}/USD", asset.symbol()),
        query: Vec::new(),
    }
}

fn parse(body: &Value) -> Option<f64> {
    json_f64(body.get("result")?.get("price")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_result_price() {
        assert_eq!(request(Asset::BTC).path, "/markets/BTC/USD");
        assert_eq!(parse(&json!({"success": true, "result": {"price": 1850.2}})), Some(1850.2));
        assert_eq!(parse(&json!({"success": true, "result": {"last": 1850.2}})), None);
        assert_eq!(parse(&json!({"success": false, "error": "No such market"})), None);
    }
}
