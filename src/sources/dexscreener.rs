use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::config::DexScreenerConfig;
use crate::models::PoolRecord;
use crate::services::{PoolNormalizer, RetryPolicy};
use super::{build_client, envelope, get_text, PoolSource, SourceError};

/// Pair entities carry no fee data; 24h fees are estimated from volume.
const ESTIMATED_FEE_RATE: f64 = 0.003;
const FEE_KEYS: &[&str] = &["fees24h", "fees24H", "earnFee", "fees", "feesUSD"];

pub struct DexScreenerSource {
    client: Client,
    config: DexScreenerConfig,
    normalizer: PoolNormalizer,
    retry: RetryPolicy,
}

impl DexScreenerSource {
    pub fn new(config: DexScreenerConfig, normalizer: PoolNormalizer) -> Result<Self, SourceError> {
        let retry = RetryPolicy::exponential(3, Duration::from_millis(config.retry_base_ms));
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
            normalizer,
            retry,
        })
    }

    fn chain_allowed(&self, pair: &Value) -> bool {
        if self.config.chains.is_empty() {
            return true;
        }
        let chain = pair.get("chainId").and_then(Value::as_str).unwrap_or_default();
        self.config.chains.iter().any(|c| c.eq_ignore_ascii_case(chain))
    }

    /// Drops pairs on other chains and fills in estimated fees.
    fn prepare(&self, mut value: Value) -> Value {
        if let Some(pairs) = value.get_mut("pairs").and_then(Value::as_array_mut) {
            pairs.retain(|p| self.chain_allowed(p));
            for pair in pairs.iter_mut() {
                estimate_fees(pair);
            }
        }
        value
    }

    pub fn parse_search(&self, body: &str) -> Vec<PoolRecord> {
        match envelope::parse_body(self.name(), body) {
            Some(value) => envelope::extract_pools(self.name(), &self.prepare(value), &self.normalizer),
            None => vec![],
        }
    }

    fn token_url(&self, address: &str) -> String {
        format!("{}/{}", self.config.tokens_url.trim_end_matches('/'), address)
    }

    /// Searches first, then per-token pair listings.
    fn lookups(&self) -> Vec<Lookup<'_>> {
        self.config
            .queries
            .iter()
            .map(|q| Lookup::Search(q.as_str()))
            .chain(self.config.token_addresses.iter().map(|a| Lookup::Token(a.as_str())))
            .collect()
    }

    async fn run_lookup(&self, lookup: Lookup<'_>) -> Result<Vec<PoolRecord>, SourceError> {
        let body = match lookup {
            Lookup::Search(query) => get_text(&self.client, &self.config.search_url, &[("q", query)]).await?,
            Lookup::Token(address) => get_text(&self.client, &self.token_url(address), &[]).await?,
        };
        Ok(self.parse_search(&body))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup<'a> {
    Search(&'a str),
    Token(&'a str),
}

impl std::fmt::Display for Lookup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::Search(q) => write!(f, "search '{}'", q),
            Lookup::Token(a) => write!(f, "token {}", a),
        }
    }
}

fn estimate_fees(pair: &mut Value) {
    let Some(obj) = pair.as_object_mut() else {
        return;
    };
    if FEE_KEYS.iter().any(|k| obj.contains_key(*k)) {
        return;
    }
    let volume = obj
        .get("volume")
        .and_then(|v| v.get("h24"))
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0.0);
    obj.insert("fees24h".to_string(), json!(volume * ESTIMATED_FEE_RATE));
}

#[async_trait]
impl PoolSource for DexScreenerSource {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>, SourceError> {
        let mut last_error = None;
        let mut any_ok = false;

        for lookup in self.lookups() {
            let label = format!("{} {}", self.name(), lookup);
            match self.retry.run(&label, || self.run_lookup(lookup), SourceError::is_retriable).await {
                Ok(pools) if !pools.is_empty() => {
                    tracing::info!("✓ {}: {} pools from {}", self.name(), pools.len(), lookup);
                    return Ok(pools);
                }
                Ok(_) => {
                    any_ok = true;
                    tracing::debug!("  {}: no pools from {}", self.name(), lookup);
                }
                Err(e) => {
                    tracing::warn!("⚠️ {} {} failed: {}", self.name(), lookup, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_ok => Err(e),
            _ => Ok(vec![]),
        }
    }
}
