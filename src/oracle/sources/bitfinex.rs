//! Bitfinex v2 ticker
//!
//! `GET /ticker/tETHUSD` returns a flat array
//! `[BID, BID_SIZE, ASK, ASK_SIZE, DAILY_CHANGE, DAILY_CHANGE_RELATIVE, LAST_PRICE, ...]`.

use serde_json::Value;

use super::{json_f64, DataRequest, Liveness, ProviderSpec};
use crate::types::{Asset, Quantity};

const LAST_PRICE_INDEX: usize = 6;

pub(super) static SPEC: ProviderSpec = ProviderSpec {
    name: "Bitfinex",
    quantity: Quantity::Price,
    base_url: "https://api-pub.bitfinex.com/v2",
    liveness: Some(Liveness {
        path: "/platform/status",
        check: platform_operative,
    }),
    request,
    parse,
};

fn request(asset: Asset) -> DataRequest {
    DataRequest {
        path: format!("/ticker/t{}USD", asset.symbol()),
        query: Vec::new(),
    }
}

fn parse(body: &Value) -> Option<f64> {
    json_f64(body.as_array()?.get(LAST_PRICE_INDEX)?)
}

/// `[1]` is operative, `[0]` is maintenance
fn platform_operative(body: &Value) -> bool {
    body.as_array()
        .and_then(|status| status.first())
        .and_then(Value::as_i64)
        == Some(1)
}
