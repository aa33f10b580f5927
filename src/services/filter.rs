use crate::config::FilterConfig;
use crate::models::{PoolRecord, TokenRef};

#[derive(Clone)]
pub struct PoolFilter {
    required: Vec<String>,
    disallowed: Vec<String>,
    min_tvl: f64,
}

impl PoolFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            required: config.required_symbols.iter().map(|s| s.to_uppercase()).collect(),
            disallowed: config.disallowed_symbols.iter().map(|s| s.to_uppercase()).collect(),
            min_tvl: config.min_tvl,
        }
    }

    /// Whether a normalized pool should be kept.
    pub fn is_valid(&self, pool: &PoolRecord) -> bool {
        let tokens = pool.tokens();
        if tokens.iter().any(|t| t.symbol.trim().is_empty()) {
            tracing::trace!("    ✗ {} missing token symbols", pool.id);
            return false;
        }

        if tokens.iter().any(|t| self.is_disallowed(&t.symbol)) {
            tracing::trace!("    ✗ {} holds a disallowed token ({})", pool.id, pool.pair());
            return false;
        }

        if !tokens.iter().any(|t| self.is_reference(&t.symbol)) {
            tracing::trace!("    ✗ {} has no reference token ({})", pool.id, pool.pair());
            return false;
        }

        pool.tvl >= self.min_tvl
    }

    pub fn is_reference(&self, symbol: &str) -> bool {
        let upper = symbol.trim().to_uppercase();
        self.required.iter().any(|r| *r == upper)
    }

    fn is_disallowed(&self, symbol: &str) -> bool {
        let upper = symbol.trim().to_uppercase();
        self.disallowed.iter().any(|d| *d == upper)
    }

    /// Address of the first token that is not a reference (quote) token.
    pub fn highlighted_contract<'a>(&self, tokens: &[&'a TokenRef]) -> Option<&'a str> {
        tokens
            .iter()
            .find(|t| !t.symbol.is_empty() && !self.is_reference(&t.symbol))
            .map(|t| t.address.as_str())
            .filter(|a| !a.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(sym0: &str, sym1: &str, tvl: f64) -> PoolRecord {
        PoolRecord {
            id: format!("{}-{}", sym0, sym1),
            token0: TokenRef::new(sym0, "0xaaa"),
            token1: TokenRef::new(sym1, "0xbbb"),
            tvl,
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_reference_token() {
        let filter = PoolFilter::new(&FilterConfig::default());
        assert!(filter.is_valid(&pool("USDT", "CAKE", 10.0)));
        assert!(filter.is_valid(&pool("foo", "usdc", 10.0)));
        assert!(!filter.is_valid(&pool("DAI", "CAKE", 10.0)));
    }

    #[test]
    fn test_rejects_weth_even_with_usdt() {
        let filter = PoolFilter::new(&FilterConfig::default());
        assert!(!filter.is_valid(&pool("WETH", "USDT", 1_000_000.0)));
        assert!(!filter.is_valid(&pool("USDC", "weth", 1_000_000.0)));
        // exact match only
        assert!(filter.is_valid(&pool("WETH2", "USDC", 1.0)));
    }

    #[test]
    fn test_min_tvl_and_missing_tokens() {
        let config = FilterConfig {
            min_tvl: 1000.0,
            ..Default::default()
        };
        let filter = PoolFilter::new(&config);
        assert!(!filter.is_valid(&pool("USDT", "CAKE", 999.0)));
        assert!(filter.is_valid(&pool("USDT", "CAKE", 1000.0)));
        assert!(!filter.is_valid(&pool("USDT", "", 5000.0)));
    }

    #[test]
    fn test_highlighted_contract_skips_reference_tokens() {
        let filter = PoolFilter::new(&FilterConfig::default());
        let usdt = TokenRef::new("USDT", "0xusdt");
        let cake = TokenRef::new("CAKE", "0xcake");
        assert_eq!(filter.highlighted_contract(&[&usdt, &cake]), Some("0xcake"));
        assert_eq!(filter.highlighted_contract(&[&cake, &usdt]), Some("0xcake"));
        assert_eq!(filter.highlighted_contract(&[&usdt, &usdt]), None);
    }
}
