//! Oracle Aggregator - Collapses a source pool into one trusted value
//!
//! Every source in the pool is polled concurrently under a timeout; the
//! successful readings are reduced by median and rounded to the pool's
//! precision. Failed or slow sources are excluded for this pass only.

use futures_util::future::join_all;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{OracleError, Result};
use crate::oracle::pool::SourcePool;
use crate::types::Asset;

/// Outcome of one successful reduce pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    /// Sources that answered this pass
    pub responded: usize,
    /// Sources asked this pass
    pub polled: usize,
}

/// Median reducer over source pools
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    /// Per-source budget; a fetch still running after it is cancelled
    source_timeout: Duration,
}

impl Aggregator {
    pub fn new(source_timeout: Duration) -> Self {
        Self { source_timeout }
    }

    /// Poll every source in `pool` for `asset` and reduce the answers
    pub async fn reduce(&self, pool: &mut SourcePool, asset: Asset) -> Result<Reading> {
        let quantity = pool.quantity();
        let timeout = self.source_timeout;

        let fetches = pool.sources_mut().iter_mut().map(|source| async move {
            let provider = source.provider();
            let result = match tokio::time::timeout(timeout, source.fetch(asset)).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::SourceUnavailable {
                    provider: provider.name(),
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                }),
            };
            (provider, result)
        });
        let results = join_all(fetches).await;

        let polled = results.len();
        let mut values = Vec::with_capacity(polled);
        for (provider, result) in results {
            match result {
                Ok(value) => values.push(value),
                Err(e) => warn!(
                    pool = %pool.name(),
                    provider = %provider,
                    asset = %asset,
                    error = %e,
                    "Source excluded from median"
                ),
            }
        }

        let value = median(&values).ok_or_else(|| OracleError::AggregationEmpty {
            pool: pool.name().to_string(),
            asset,
        })?;

        let reading = Reading {
            value: quantity.round(value),
            responded: values.len(),
            polled,
        };
        debug!(
            pool = %pool.name(),
            asset = %asset,
            value = reading.value,
            responded = reading.responded,
            polled = reading.polled,
            "Pool reduced"
        );
        Ok(reading)
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Statistical median; mean of the two middle values for even counts
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        let (lo, hi) = (sorted[mid - 1], sorted[mid]);
        Some(lo + (hi - lo) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::oracle::sources::{Provider, QuoteSource};
    use crate::oracle::transport::{JsonTransport, MockJsonTransport};
    use crate::types::Quantity;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn binance_source(answer: Option<&'static str>) -> QuoteSource {
        let mut transport = MockJsonTransport::new();
        transport.expect_get_json().returning(move |url, _| match answer {
            Some(price) => Ok(json!({ "price": price })),
            None => Err(OracleError::HttpStatus {
                status: 502,
                url: url.to_string(),
            }),
        });
        QuoteSource::new(Provider::Binance, Duration::ZERO, Arc::new(transport))
    }

    fn spot_pool(answers: &[Option<&'static str>]) -> SourcePool {
        let mut pool = SourcePool::new("spot", Quantity::Price);
        for answer in answers {
            pool.push(binance_source(*answer)).unwrap();
        }
        pool
    }

    /// Never answers inside any sane timeout
    struct StalledTransport;

    #[async_trait]
    impl JsonTransport for StalledTransport {
        async fn get_json(&self, _url: &str, _query: &[(String, String)]) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!({ "price": "1.0" }))
        }
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[100.0, 101.0, 99.0]), Some(100.0));
        assert_eq!(median(&[100.0, 102.0]), Some(101.0));
        assert_eq!(median(&[42.0]), Some(42.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn median_of_extreme_readings_stays_finite() {
        let mid = median(&[1e308, 1.7e308]).unwrap();
        assert!(mid.is_finite());
        assert!((mid / 1.35e308 - 1.0).abs() < 1e-12, "{}", mid);
        assert!(median(&[-1e308, -1.7e308]).unwrap().is_finite());
    }

    #[tokio::test]
    async fn three_sources_reduce_to_median() {
        let mut pool = spot_pool(&[Some("100.0"), Some("101.0"), Some("99.0")]);
        let reading = Aggregator::default().reduce(&mut pool, Asset::ETH).await.unwrap();
        assert_eq!(reading.value, 100.0);
        assert_eq!((reading.responded, reading.polled), (3, 3));
    }

    #[tokio::test]
    async fn even_count_takes_mean_of_middles() {
        let mut pool = spot_pool(&[Some("100.0"), Some("102.0")]);
        let reading = Aggregator::default().reduce(&mut pool, Asset::ETH).await.unwrap();
        assert_eq!(reading.value, 101.0);
    }

    #[tokio::test]
    async fn failed_sources_are_excluded() {
        let mut pool = spot_pool(&[None, Some("1850.1234"), None]);
        let reading = Aggregator::default().reduce(&mut pool, Asset::ETH).await.unwrap();
        assert_eq!(reading.value, 1850.123);
        assert_eq!((reading.responded, reading.polled), (1, 3));
    }

    #[tokio::test]
    async fn all_sources_down_is_aggregation_empty() {
        let mut pool = spot_pool(&[None, None]);
        let err = Aggregator::default().reduce(&mut pool, Asset::ETH).await.unwrap_err();
        assert!(matches!(
            err,
            OracleError::AggregationEmpty { ref pool, asset: Asset::ETH } if pool == "spot"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_is_cancelled_and_excluded() {
        let mut pool = spot_pool(&[Some("100.0"), Some("104.0")]);
        pool.push(QuoteSource::new(
            Provider::Binance,
            Duration::ZERO,
            Arc::new(StalledTransport),
        ))
        .unwrap();

        let aggregator = Aggregator::new(Duration::from_millis(250));
        let reading = aggregator.reduce(&mut pool, Asset::ETH).await.unwrap();

        assert_eq!(reading.value, 102.0);
        assert_eq!((reading.responded, reading.polled), (2, 3));
        assert_eq!(pool.sources()[2].cached(Asset::ETH), None);
    }
}
