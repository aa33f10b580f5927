use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use crate::config::BinanceConfig;
use crate::models::AlphaTicker;
use crate::services::RetryPolicy;
use super::{build_client, get_text, SourceError, TickerSource};

const QUOTE_ASSET: &str = "USDT";

pub struct BinanceClient {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    quote_volume: String,
}

impl RawTicker {
    fn into_ticker(self) -> Option<AlphaTicker> {
        Some(AlphaTicker {
            last_price: self.last_price.parse().ok()?,
            price_change_percent: self.price_change_percent.parse().ok()?,
            quote_volume: self.quote_volume.parse().ok()?,
            symbol: self.symbol,
        })
    }
}

/// Keeps `*USDT` pairs whose numeric fields all parse.
pub fn parse_tickers(body: &str) -> Result<Vec<AlphaTicker>, SourceError> {
    let raw: Vec<RawTicker> = serde_json::from_str(body)
        .map_err(|e| SourceError::Api(format!("unexpected ticker payload: {}", e)))?;

    Ok(raw
        .into_iter()
        .filter(|t| t.symbol.ends_with(QUOTE_ASSET))
        .filter_map(RawTicker::into_ticker)
        .collect())
}

impl BinanceClient {
    pub fn new(config: &BinanceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: config.ticker_url.clone(),
            retry: RetryPolicy::exponential(3, Duration::from_millis(config.retry_base_ms)),
        })
    }

    async fn fetch_once(&self) -> Result<Vec<AlphaTicker>, SourceError> {
        let body = get_text(&self.client, &self.url, &[]).await?;
        parse_tickers(&body)
    }
}

#[async_trait]
impl TickerSource for BinanceClient {
    async fn fetch_tickers(&self) -> Result<Vec<AlphaTicker>, SourceError> {
        let tickers = self
            .retry
            .run("binance 24hr ticker", || self.fetch_once(), SourceError::is_retriable)
            .await?;
        tracing::debug!("  binance: {} USDT tickers", tickers.len());
        Ok(tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tickers() {
        let body = r#"[
            {"symbol":"BTCUSDT","lastPrice":"65000.10","priceChangePercent":"-2.5","quoteVolume":"123456789.0","count":1},
            {"symbol":"ETHBTC","lastPrice":"0.05","priceChangePercent":"1.0","quoteVolume":"10"},
            {"symbol":"BADUSDT","lastPrice":"n/a","priceChangePercent":"1.0","quoteVolume":"10"}
        ]"#;
        let tickers = parse_tickers(body).unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].symbol, "BTCUSDT");
        assert_eq!(tickers[0].last_price, 65000.10);
        assert_eq!(tickers[0].price_change_percent, -2.5);
        assert_eq!(tickers[0].base_asset(), "BTC");
    }

    #[test]
    fn test_error_payload() {
        let body = r#"{"code":-1003,"msg":"Too much request weight used"}"#;
        assert!(matches!(parse_tickers(body), Err(SourceError::Api(_))));
    }
}
