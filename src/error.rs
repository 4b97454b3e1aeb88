//! Oracle error types

use thiserror::Error;

use crate::types::Asset;

/// Errors raised by the aggregation-and-posting engine
#[derive(Error, Debug)]
pub enum OracleError {
    /// One provider failed, timed out, or returned an unparseable payload
    #[error("{provider} unavailable: {reason}")]
    SourceUnavailable {
        provider: &'static str,
        reason: String,
    },

    /// Provider failed its liveness check at startup
    #[error("{provider} failed liveness check: {reason}")]
    SourceOffline {
        provider: &'static str,
        reason: String,
    },

    /// Every source in a pool failed for this pass
    #[error("no {pool} source responded for {asset}")]
    AggregationEmpty { pool: String, asset: Asset },

    /// Mark price service returned non-2xx or a malformed payload
    #[error("pricing service error: {0}")]
    PricingService(String),

    /// Ledger submission failed after retries
    #[error("ledger submission failed for {asset}: {reason}")]
    Submission { asset: Asset, reason: String },

    /// Publication policy cannot be evaluated against the current state
    #[error("policy invariant violated: {0}")]
    PolicyInvariant(String),

    #[error("{0} is not initialized")]
    NotInitialized(Asset),

    #[error("{0} is already initialized")]
    AlreadyInitialized(Asset),

    #[error("{0} is not configured on this bot")]
    UnknownAsset(Asset),

    /// Startup could not produce a first snapshot
    #[error("initialization failed for {asset}: {source}")]
    Initialization {
        asset: Asset,
        #[source]
        source: Box<OracleError>,
    },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// An asset loop panicked or was cancelled
    #[error("asset task failed: {0}")]
    TaskFailed(String),
}

impl OracleError {
    /// Whether the steady-state loop absorbs this error with a fallback
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OracleError::SourceUnavailable { .. }
                | OracleError::AggregationEmpty { .. }
                | OracleError::PricingService(_)
                | OracleError::HttpStatus { .. }
                | OracleError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => OracleError::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => OracleError::Transport(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
