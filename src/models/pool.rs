use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRef {
    pub symbol: String,
    #[serde(default)]
    pub address: String,
}

impl TokenRef {
    pub fn new(symbol: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            address: address.into(),
        }
    }
}

/// One liquidity pool as seen in a single fetch cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub id: String,
    pub name: String,
    pub token0: TokenRef,
    pub token1: TokenRef,
    pub tvl: f64,
    pub volume_24h: f64,
    pub fees_24h: f64,
    pub apr: f64,
    /// Percentage, so `0.01` renders as "0.01%".
    pub fee_tier: f64,
    pub protocol: String,
    pub version: String,
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub chain_name: String,
    #[serde(default)]
    pub contract_address: String,
    pub url: String,
    pub source: String,
}

impl PoolRecord {
    pub fn pair(&self) -> String {
        format!("{}/{}", self.token0.symbol, self.token1.symbol)
    }

    pub fn tokens(&self) -> [&TokenRef; 2] {
        [&self.token0, &self.token1]
    }
}
