pub mod binance;
pub mod dexscreener;
pub mod envelope;
pub mod failover;
pub mod kyberswap;

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use crate::models::{AlphaTicker, PoolRecord};

pub use failover::FailoverChain;

const USER_AGENT: &str = concat!("pool-notifier/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait PoolSource: Send + Sync {
    fn name(&self) -> &'static str;
    /// Normalized, filtered pools for one cycle.
    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>, SourceError>;
}

#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn fetch_tickers(&self) -> Result<Vec<AlphaTicker>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("rate limited")]
    RateLimit,
    #[error("api error: {0}")]
    Api(String),
    #[error("client error: {0}")]
    Client(String),
    #[error("all sources failed, last error: {0}")]
    Exhausted(String),
}

impl SourceError {
    /// Transport failures and 5xx responses are worth another attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            SourceError::Network(e) => !e.is_builder() && !e.is_decode(),
            SourceError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SourceError::Client(e.to_string()))
}

/// GETs `url` and returns the body of a 2xx response.
pub(crate) async fn get_text(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<String, SourceError> {
    let resp = client
        .get(url)
        .query(query)
        .header(header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::RateLimit);
    }
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(resp.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_statuses() {
        let server = SourceError::Status { status: 503, url: "u".into() };
        let client = SourceError::Status { status: 404, url: "u".into() };
        assert!(server.is_retriable());
        assert!(!client.is_retriable());
        assert!(!SourceError::RateLimit.is_retriable());
        assert!(!SourceError::Api("code 1".into()).is_retriable());
    }
}
