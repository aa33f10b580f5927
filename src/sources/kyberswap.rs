use std::collections::HashSet;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use crate::config::KyberSwapConfig;
use crate::models::PoolRecord;
use crate::services::PoolNormalizer;
use super::{build_client, envelope, get_text, PoolSource, SourceError};

/// KyberSwap zap-earn explorer, high-APR tag.
pub struct KyberSwapSource {
    client: Client,
    config: KyberSwapConfig,
    normalizer: PoolNormalizer,
}

impl KyberSwapSource {
    pub fn new(config: KyberSwapConfig, normalizer: PoolNormalizer) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
            normalizer,
        })
    }

    fn page_query(&self, page: u32) -> Vec<(&'static str, String)> {
        let chains = self
            .config
            .chain_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        vec![
            ("chainIds", chains),
            ("page", page.to_string()),
            ("limit", self.config.page_size.to_string()),
            ("interval", "24h".to_string()),
            ("protocol", String::new()),
            ("tag", "high_apr".to_string()),
            ("sortBy", String::new()),
            ("orderBy", String::new()),
            ("q", String::new()),
        ]
    }

    /// Interprets one page body. A non-zero `code` is an API error.
    pub fn parse_page(&self, body: &str) -> Result<Vec<PoolRecord>, SourceError> {
        let Some(value) = envelope::parse_body(self.name(), body) else {
            return Ok(vec![]);
        };

        if let Some(code) = value.get("code").and_then(Value::as_i64) {
            if code != 0 {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(SourceError::Api(format!("code {}: {}", code, message)));
            }
        }

        Ok(envelope::extract_pools(self.name(), &value, &self.normalizer))
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<PoolRecord>, SourceError> {
        let query = self.page_query(page);
        let pairs: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let body = get_text(&self.client, &self.config.base_url, &pairs).await?;
        self.parse_page(&body)
    }
}

/// Merges pages in order, dropping ids already seen on an earlier page.
fn merge_pages(pages: Vec<Vec<PoolRecord>>) -> Vec<PoolRecord> {
    let mut seen = HashSet::new();
    pages
        .into_iter()
        .flatten()
        .filter(|p| seen.insert(p.id.clone()))
        .collect()
}

#[async_trait]
impl PoolSource for KyberSwapSource {
    fn name(&self) -> &'static str {
        "kyberswap"
    }

    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>, SourceError> {
        let pages = self.config.pages.max(1);
        let mut collected = Vec::new();
        let mut last_error = None;

        for page in 1..=pages {
            match self.fetch_page(page).await {
                Ok(pools) => {
                    tracing::debug!("  {} page {}: {} pools", self.name(), page, pools.len());
                    collected.push(pools);
                }
                Err(e) => {
                    tracing::error!("❌ {} page {} failed: {}", self.name(), page, e);
                    last_error = Some(e);
                }
            }

            if page < pages && self.config.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
            }
        }

        if collected.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let pools = merge_pages(collected);
        tracing::info!("✓ {}: {} pools across {} pages", self.name(), pools.len(), pages);
        Ok(pools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::services::PoolFilter;
    use serde_json::json;

    fn source() -> KyberSwapSource {
        let normalizer = PoolNormalizer::new(
            "kyberswap",
            "https://kyberswap.com/earn/pools",
            PoolFilter::new(&FilterConfig::default()),
        );
        KyberSwapSource::new(KyberSwapConfig::default(), normalizer).unwrap()
    }

    #[test]
    fn test_page_query() {
        let query = source().page_query(3);
        assert!(query.contains(&("chainIds", "56,8453".to_string())));
        assert!(query.contains(&("page", "3".to_string())));
        assert!(query.contains(&("limit", "10".to_string())));
        assert!(query.contains(&("tag", "high_apr".to_string())));
    }

    #[test]
    fn test_parse_page() {
        let body = json!({
            "code": 0,
            "message": "OK",
            "data": { "pools": [
                {
                    "address": "0xa",
                    "chainId": 8453,
                    "exchange": "pancake-infinity-cl",
                    "tvl": 10000,
                    "apr": 321.0,
                    "tokens": [{ "symbol": "AERO", "address": "0xaero" }, { "symbol": "USDC", "address": "0xusdc" }]
                },
                {
                    "address": "0xb",
                    "tokens": [{ "symbol": "WETH" }, { "symbol": "USDC" }]
                }
            ]}
        })
        .to_string();

        let pools = source().parse_page(&body).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].id, "0xa");
        assert_eq!(pools[0].protocol, "Pancake");
        assert_eq!(pools[0].version, "v3");
        assert_eq!(pools[0].url, "https://kyberswap.com/earn/pools/0xa");
    }

    #[test]
    fn test_non_zero_code_is_api_error() {
        let body = r#"{"code": 4001, "message": "invalid chain"}"#;
        match source().parse_page(body) {
            Err(SourceError::Api(msg)) => assert!(msg.contains("invalid chain")),
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_page_is_empty() {
        assert!(source().parse_page("<html>maintenance</html>").unwrap().is_empty());
    }

    #[test]
    fn test_merge_pages_dedups() {
        let pool = |id: &str| PoolRecord { id: id.to_string(), ..Default::default() };
        let merged = merge_pages(vec![vec![pool("a"), pool("b")], vec![pool("b"), pool("c")]]);
        let ids: Vec<&str> = merged.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
