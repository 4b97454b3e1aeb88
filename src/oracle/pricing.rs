//! Mark price adapter
//!
//! Asks the pricing backend for call/put marks at a given spot and rate:
//! `GET {base}/public/price/mark/{code}?spot=..&interestRate=..` answering
//! `{"message": {"call": [...], "put": [...]}}`.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{OracleError, Result};
use crate::oracle::sources::json_f64;
use crate::oracle::transport::JsonTransport;
use crate::types::{Asset, Quantity};

/// Default backend for the local chain
pub const LOCAL_PRICING_URL: &str = "http://localhost:8080";
/// Default backend for test and main chains
pub const HOSTED_PRICING_URL: &str = "https://paretolabs.xyz";

/// Call and put marks, index-aligned
#[derive(Debug, Clone, PartialEq)]
pub struct MarkPrices {
    pub call_prices: Vec<f64>,
    pub put_prices: Vec<f64>,
}

pub struct PricingAdapter {
    base_url: String,
    transport: Arc<dyn JsonTransport>,
    timeout: Duration,
}

impl PricingAdapter {
    pub fn new(base_url: &str, transport: Arc<dyn JsonTransport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Marks for `asset` at the given spot and interest rate
    pub async fn derive(&self, asset: Asset, spot_price: f64, interest_rate: f64) -> Result<MarkPrices> {
        let url = format!(
            "{}/public/price/mark/{}",
            self.base_url,
            asset.underlying_code()
        );
        let query = vec![
            ("spot".to_string(), spot_price.to_string()),
            ("interestRate".to_string(), interest_rate.to_string()),
        ];

        let body = tokio::time::timeout(self.timeout, self.transport.get_json(&url, &query))
            .await
            .map_err(|_| {
                OracleError::PricingService(format!("timed out after {}ms", self.timeout.as_millis()))
            })?
            .map_err(|e| OracleError::PricingService(e.to_string()))?;

        let marks = parse_marks(&body)?;
        debug!(
            asset = %asset,
            spot = spot_price,
            rate = interest_rate,
            strikes = marks.call_prices.len(),
            "Marks derived"
        );
        Ok(marks)
    }
}

fn parse_marks(body: &Value) -> Result<MarkPrices> {
    let message = body
        .get("message")
        .ok_or_else(|| OracleError::PricingService("response has no message".to_string()))?;

    let call_prices = parse_side(message, "call")?;
    let put_prices = parse_side(message, "put")?;

    if call_prices.len() != put_prices.len() {
        return Err(OracleError::PricingService(format!(
            "{} call marks but {} put marks",
            call_prices.len(),
            put_prices.len()
        )));
    }

    Ok(MarkPrices {
        call_prices,
        put_prices,
    })
}

/// Any entry that is not numeric fails the whole side
fn parse_side(message: &Value, side: &str) -> Result<Vec<f64>> {
    let entries = message
        .get(side)
        .ok_or_else(|| OracleError::PricingService(format!("message has no '{}' marks", side)))?
        .as_array()
        .ok_or_else(|| OracleError::PricingService(format!("'{}' marks are not a list", side)))?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            json_f64(entry)
                .map(|mark| Quantity::Price.round(mark))
                .ok_or_else(|| {
                    OracleError::PricingService(format!("{}[{}] is not numeric: {}", side, i, entry))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::transport::MockJsonTransport;
    use serde_json::json;

    fn adapter_answering(body: Result<Value>) -> PricingAdapter {
        let mut transport = MockJsonTransport::new();
        let mut body = Some(body);
        transport
            .expect_get_json()
            .withf(|url, query| {
                url.ends_with("/public/price/mark/0")
                    && query.len() == 2
                    && query[0].0 == "spot"
                    && query[0].1 == "1850.25"
                    && query[1].0 == "interestRate"
                    && query[1].1 == "0.0134"
            })
            .times(1)
            .returning(move |_, _| body.take().unwrap());
        PricingAdapter::new("http://localhost:8080/", Arc::new(transport))
    }

    #[tokio::test]
    async fn derives_rounded_marks_from_strings_and_numbers() {
        let adapter = adapter_answering(Ok(json!({
            "message": {
                "call": ["120.12345", 64.5, "12.0001"],
                "put": [3.2, "18.4567", 70.0]
            }
        })));
        assert_eq!(adapter.base_url(), "http://localhost:8080");

        let marks = adapter.derive(Asset::ETH, 1850.25, 0.0134).await.unwrap();
        assert_eq!(marks.call_prices, vec![120.123, 64.5, 12.0]);
        assert_eq!(marks.put_prices, vec![3.2, 18.457, 70.0]);
    }

    #[tokio::test]
    async fn non_success_status_is_a_pricing_error() {
        let adapter = adapter_answering(Err(OracleError::HttpStatus {
            status: 500,
            url: "http://localhost:8080/public/price/mark/0".to_string(),
        }));
        let err = adapter.derive(Asset::ETH, 1850.25, 0.0134).await.unwrap_err();
        assert!(matches!(err, OracleError::PricingService(_)));
    }

    #[tokio::test]
    async fn missing_put_side_fails() {
        let adapter = adapter_answering(Ok(json!({ "message": { "call": [1.0, 2.0] } })));
        let err = adapter.derive(Asset::ETH, 1850.25, 0.0134).await.unwrap_err();
        assert!(err.to_string().contains("'put'"));
    }

    #[test]
    fn one_bad_entry_fails_the_whole_payload() {
        let body = json!({ "message": { "call": [1.0, "oops"], "put": [1.0, 2.0] } });
        let err = parse_marks(&body).unwrap_err();
        assert!(err.to_string().contains("call[1]"));
    }

    #[test]
    fn mismatched_sides_fail() {
        let body = json!({ "message": { "call": [1.0, 2.0], "put": [1.0] } });
        assert!(parse_marks(&body).is_err());
        assert!(parse_marks(&json!({ "error": "unknown underlying" })).is_err());
    }
}
