use serde::{Deserialize, Serialize};

/// A spot pair's 24h ticker, quoted in USDT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaTicker {
    pub symbol: String,
    pub last_price: f64,
    pub price_change_percent: f64,
    pub quote_volume: f64,
}

impl AlphaTicker {
    /// Symbol without the quote asset, e.g. `BTC` for `BTCUSDT`.
    pub fn base_asset(&self) -> &str {
        self.symbol.strip_suffix("USDT").unwrap_or(&self.symbol)
    }
}
