use serde_json::Value;
use crate::models::{PoolRecord, TokenRef};
use super::filter::PoolFilter;

const ID_KEYS: &[&str] = &["address", "id", "poolId", "pool_id", "pairAddress"];
const NUMERIC_ID_KEYS: &[&str] = &["id", "poolId"];
const APR_KEYS: &[&str] = &["apr", "apy", "allApr"];
const TVL_KEYS: &[&str] = &["tvl", "totalValueLocked", "totalValueLockedUSD", "liquidity.usd"];
const VOLUME_KEYS: &[&str] = &["volume24h", "volume24H", "volume", "volumeUSD", "volume.h24"];
const FEES_KEYS: &[&str] = &["fees24h", "fees24H", "earnFee", "fees", "feesUSD"];
const FEE_TIER_KEYS: &[&str] = &["feeTier", "fee_tier", "fee"];
const CHAIN_ID_KEYS: &[&str] = &["chainId", "chain_id", "chain.id"];
const CHAIN_NAME_KEYS: &[&str] = &["chain.name", "chainName", "chainId"];
const PROTOCOL_KEYS: &[&str] = &["protocol", "protocolName", "dexId"];
const VERSION_KEYS: &[&str] = &["version", "poolVersion", "v"];

/// Resolves a possibly dotted key (`liquidity.usd`) against a JSON object.
fn lookup<'a>(entity: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(entity, |node, part| node.get(part))
}

fn first_str(entity: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| lookup(entity, k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn first_number(entity: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| lookup(entity, k)).find_map(as_number)
}

fn parse_token(value: &Value) -> TokenRef {
    TokenRef {
        symbol: value.get("symbol").and_then(Value::as_str).unwrap_or_default().to_string(),
        address: value.get("address").and_then(Value::as_str).unwrap_or_default().to_string(),
    }
}

fn parse_tokens(entity: &Value) -> (TokenRef, TokenRef) {
    if let Some(tokens) = entity.get("tokens").and_then(Value::as_array) {
        if tokens.len() >= 2 {
            return (parse_token(&tokens[0]), parse_token(&tokens[1]));
        }
    }
    for (a, b) in [("token0", "token1"), ("baseToken", "quoteToken")] {
        if let (Some(t0), Some(t1)) = (entity.get(a), entity.get(b)) {
            return (parse_token(t0), parse_token(t1));
        }
    }
    (TokenRef::default(), TokenRef::default())
}

/// Maps an exchange slug (e.g. `uniswap-v4`, `pancake-infinity-cl`) to (protocol, version).
fn classify_exchange(exchange: &str) -> (String, Option<&'static str>) {
    let lower = exchange.to_lowercase();
    let compact = lower.replace(['-', '_', ' '], "");
    if compact.contains("uniswapv4") {
        ("Uniswap".to_string(), Some("v4"))
    } else if compact.contains("uniswapv3") {
        ("Uniswap".to_string(), Some("v3"))
    } else if compact.contains("pancakev3") || compact.contains("pancakeinfinity") {
        ("Pancake".to_string(), Some("v3"))
    } else if lower.contains("kyber") {
        ("KyberSwap".to_string(), None)
    } else {
        (exchange.to_string(), None)
    }
}

fn normalize_fee_tier(raw: f64) -> f64 {
    if (raw - 0.01).abs() <= 0.001 {
        0.01
    } else if (raw - 1.0).abs() <= 0.01 {
        1.0
    } else {
        raw
    }
}

fn infer_version(id: &str, name: &str) -> &'static str {
    let id = id.to_lowercase();
    let name = name.to_lowercase();
    if id.contains("v4") || name.contains("v4") {
        "v4"
    } else {
        "v3"
    }
}

/// Turns one raw upstream pool entity into a [`PoolRecord`].
#[derive(Clone)]
pub struct PoolNormalizer {
    source: String,
    url_base: String,
    filter: PoolFilter,
}

impl PoolNormalizer {
    pub fn new(source: impl Into<String>, url_base: impl Into<String>, filter: PoolFilter) -> Self {
        let url_base: String = url_base.into();
        Self {
            source: source.into(),
            url_base: url_base.trim_end_matches('/').to_string(),
            filter,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse plus the inclusion filter.
    pub fn normalize(&self, entity: &Value) -> Option<PoolRecord> {
        self.parse(entity).filter(|p| self.accepts(p))
    }

    pub fn accepts(&self, pool: &PoolRecord) -> bool {
        self.filter.is_valid(pool)
    }

    /// Parses without filtering. `None` when no identifier can be found.
    pub fn parse(&self, entity: &Value) -> Option<PoolRecord> {
        if !entity.is_object() {
            return None;
        }

        let id = first_str(entity, ID_KEYS).or_else(|| {
            NUMERIC_ID_KEYS
                .iter()
                .filter_map(|k| entity.get(*k))
                .find_map(|v| v.as_u64().map(|n| n.to_string()))
        })?;

        let (token0, token1) = parse_tokens(entity);
        let name = first_str(entity, &["name"]).unwrap_or_else(|| {
            if token0.symbol.is_empty() && token1.symbol.is_empty() {
                String::new()
            } else {
                format!("{}/{}", token0.symbol, token1.symbol)
            }
        });

        let tvl = first_number(entity, TVL_KEYS).unwrap_or(0.0);
        let volume_24h = first_number(entity, VOLUME_KEYS).unwrap_or(0.0);
        let fees_24h = first_number(entity, FEES_KEYS).unwrap_or(0.0);
        let apr = first_number(entity, APR_KEYS).unwrap_or_else(|| {
            if tvl > 0.0 {
                fees_24h / tvl * 365.0 * 100.0
            } else {
                0.0
            }
        });

        let (protocol, exchange_version) = match first_str(entity, &["exchange"]) {
            Some(exchange) => classify_exchange(&exchange),
            None => (first_str(entity, PROTOCOL_KEYS).unwrap_or_default(), None),
        };
        let version = first_str(entity, VERSION_KEYS)
            .map(|v| v.to_lowercase())
            .or_else(|| exchange_version.map(str::to_string))
            .unwrap_or_else(|| infer_version(&id, &name).to_string());

        let chain_id = CHAIN_ID_KEYS
            .iter()
            .filter_map(|k| lookup(entity, k))
            .find_map(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())));
        let chain_name = first_str(entity, CHAIN_NAME_KEYS).unwrap_or_default();

        let contract_address = self
            .filter
            .highlighted_contract(&[&token0, &token1])
            .unwrap_or_default()
            .to_string();

        let url = first_str(entity, &["url"])
            .unwrap_or_else(|| format!("{}/{}", self.url_base, id));

        Some(PoolRecord {
            id,
            name,
            token0,
            token1,
            tvl,
            volume_24h,
            fees_24h,
            apr,
            fee_tier: first_number(entity, FEE_TIER_KEYS).map(normalize_fee_tier).unwrap_or(0.0),
            protocol,
            version,
            chain_id,
            chain_name,
            contract_address,
            url,
            source: self.source.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use serde_json::json;

    fn normalizer() -> PoolNormalizer {
        PoolNormalizer::new(
            "kyberswap",
            "https://kyberswap.com/earn/pools/",
            PoolFilter::new(&FilterConfig::default()),
        )
    }

    #[test]
    fn test_kyber_shaped_entity() {
        let raw = json!({
            "address": "0xpool",
            "chainId": 56,
            "exchange": "uniswap-v4",
            "feeTier": 0.0100001,
            "tvl": 50000.0,
            "volume": "120000",
            "earnFee": 36.0,
            "apr": 412.5,
            "tokens": [
                { "symbol": "CAKE", "address": "0xcake" },
                { "symbol": "USDT", "address": "0xusdt" }
            ]
        });
        let pool = normalizer().normalize(&raw).unwrap();
        assert_eq!(pool.id, "0xpool");
        assert_eq!(pool.name, "CAKE/USDT");
        assert_eq!(pool.chain_id, Some(56));
        assert_eq!(pool.protocol, "Uniswap");
        assert_eq!(pool.version, "v4");
        assert_eq!(pool.fee_tier, 0.01);
        assert_eq!(pool.volume_24h, 120000.0);
        assert_eq!(pool.fees_24h, 36.0);
        assert_eq!(pool.apr, 412.5);
        assert_eq!(pool.contract_address, "0xcake");
        assert_eq!(pool.url, "https://kyberswap.com/earn/pools/0xpool");
        assert_eq!(pool.source, "kyberswap");
    }

    #[test]
    fn test_derived_apr() {
        let raw = json!({
            "id": "p1",
            "tvl": 1000.0,
            "fees24h": 1.0,
            "token0": { "symbol": "USDC" },
            "token1": { "symbol": "ARB" }
        });
        let pool = normalizer().normalize(&raw).unwrap();
        assert!((pool.apr - 36.5).abs() < 1e-9);

        let zero_tvl = json!({ "id": "p2", "fees24h": 5.0 });
        assert_eq!(normalizer().parse(&zero_tvl).unwrap().apr, 0.0);
    }

    #[test]
    fn test_dexscreener_pair_shape() {
        let raw = json!({
            "chainId": "bsc",
            "dexId": "pancakeswap",
            "url": "https://dexscreener.com/bsc/0xpair",
            "pairAddress": "0xpair",
            "baseToken": { "address": "0xfoo", "symbol": "FOO" },
            "quoteToken": { "address": "0xusdt", "symbol": "USDT" },
            "volume": { "h24": 2000.5 },
            "liquidity": { "usd": 10000 }
        });
        let pool = normalizer().normalize(&raw).unwrap();
        assert_eq!(pool.id, "0xpair");
        assert_eq!(pool.tvl, 10000.0);
        assert_eq!(pool.volume_24h, 2000.5);
        assert_eq!(pool.protocol, "pancakeswap");
        assert_eq!(pool.chain_id, None);
        assert_eq!(pool.chain_name, "bsc");
        assert_eq!(pool.url, "https://dexscreener.com/bsc/0xpair");
        assert_eq!(pool.version, "v3");
    }

    #[test]
    fn test_numeric_id_and_missing_id() {
        let n = normalizer();
        assert_eq!(n.parse(&json!({ "poolId": 42 })).unwrap().id, "42");
        assert!(n.parse(&json!({ "name": "no id" })).is_none());
        assert!(n.parse(&json!("just a string")).is_none());
    }

    #[test]
    fn test_fee_tier_mapping() {
        assert_eq!(normalize_fee_tier(0.0105), 0.01);
        assert_eq!(normalize_fee_tier(0.995), 1.0);
        assert_eq!(normalize_fee_tier(0.3), 0.3);
        assert_eq!(normalize_fee_tier(0.05), 0.05);
    }

    #[test]
    fn test_exchange_classification() {
        assert_eq!(classify_exchange("pancake-infinity-cl"), ("Pancake".to_string(), Some("v3")));
        assert_eq!(classify_exchange("uniswapv3"), ("Uniswap".to_string(), Some("v3")));
        assert_eq!(classify_exchange("kyber-elastic"), ("KyberSwap".to_string(), None));
        assert_eq!(classify_exchange("aerodrome"), ("aerodrome".to_string(), None));
    }

    #[test]
    fn test_version_precedence() {
        let n = normalizer();
        let explicit = json!({ "id": "x-v4", "exchange": "uniswap-v3", "version": "V4" });
        assert_eq!(n.parse(&explicit).unwrap().version, "v4");

        let from_exchange = json!({ "id": "x-v4", "exchange": "uniswap-v3" });
        assert_eq!(n.parse(&from_exchange).unwrap().version, "v3");

        let from_id = json!({ "id": "hook-v4-pool" });
        assert_eq!(n.parse(&from_id).unwrap().version, "v4");
    }

    #[test]
    fn test_filter_applies_only_on_normalize() {
        let raw = json!({
            "id": "weth-usdt",
            "tokens": [{ "symbol": "WETH" }, { "symbol": "USDT" }]
        });
        assert!(normalizer().parse(&raw).is_some());
        assert!(normalizer().normalize(&raw).is_none());
    }
}
