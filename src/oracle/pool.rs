//! Source pools - quote sources grouped by the quantity they provide

use std::sync::Arc;
use std::time::Duration;

use crate::error::{OracleError, Result};
use crate::oracle::sources::{Provider, QuoteSource};
use crate::oracle::transport::JsonTransport;
use crate::types::Quantity;

/// Named set of sources for one quantity (e.g. "spot" prices)
#[derive(Debug)]
pub struct SourcePool {
    name: String,
    quantity: Quantity,
    sources: Vec<QuoteSource>,
}

impl SourcePool {
    pub fn new(name: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            name: name.into(),
            quantity,
            sources: Vec::new(),
        }
    }

    /// Connect every provider, failing on the first that is offline
    pub async fn connect(
        name: impl Into<String>,
        quantity: Quantity,
        providers: &[Provider],
        ttl: Duration,
        transport: Arc<dyn JsonTransport>,
    ) -> Result<Self> {
        let mut pool = Self::new(name, quantity);
        for &provider in providers {
            let source = QuoteSource::connect(provider, ttl, transport.clone()).await?;
            pool.push(source)?;
        }
        if pool.is_empty() {
            return Err(OracleError::Config(format!(
                "{} pool has no sources configured",
                pool.name
            )));
        }
        Ok(pool)
    }

    /// Add a source; its provider must supply this pool's quantity
    pub fn push(&mut self, source: QuoteSource) -> Result<()> {
        if source.quantity() != self.quantity {
            return Err(OracleError::Config(format!(
                "{} provides {} but pool '{}' holds {}",
                source.provider(),
                source.quantity(),
                self.name,
                self.quantity
            )));
        }
        self.sources.push(source);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[QuoteSource] {
        &self.sources
    }

    pub(crate) fn sources_mut(&mut self) -> &mut [QuoteSource] {
        &mut self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::transport::MockJsonTransport;

    #[test]
    fn rejects_source_of_other_quantity() {
        let transport: Arc<dyn JsonTransport> = Arc::new(MockJsonTransport::new());
        let mut pool = SourcePool::new("spot", Quantity::Price);

        pool.push(QuoteSource::new(Provider::Binance, Duration::from_secs(5), transport.clone()))
            .unwrap();
        let err = pool
            .push(QuoteSource::new(Provider::CompoundV2, Duration::from_secs(5), transport))
            .unwrap_err();

        assert!(matches!(err, OracleError::Config(_)));
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn connect_requires_at_least_one_provider() {
        let transport: Arc<dyn JsonTransport> = Arc::new(MockJsonTransport::new());
        let err = SourcePool::connect("rate", Quantity::Rate, &[], Duration::from_secs(5), transport)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Config(_)));
    }
}
