//! HTTP transport shared by quote sources and the pricing adapter

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{OracleError, Result};

/// GET-and-decode boundary; every external read goes through this.
///
/// Implementations return `HttpStatus` for non-2xx responses so callers can
/// treat status and connection failures the same way.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("oraclebot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonTransport for ReqwestTransport {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = %status, "Non-success response");
            return Err(OracleError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}
