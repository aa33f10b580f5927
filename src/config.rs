use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use chrono::NaiveTime;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub reset: ResetConfig,
    #[serde(default)]
    pub alpha: AlphaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Days of per-day dedup files kept on disk.
    #[serde(default = "default_retain_days")]
    pub retain_days: u32,
}

fn default_data_dir() -> String { "./data".to_string() }
fn default_retain_days() -> u32 { 7 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            retain_days: default_retain_days(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    /// A pool qualifies only if one of its tokens is in this list.
    #[serde(default = "default_required_symbols")]
    pub required_symbols: Vec<String>,
    /// A pool holding any of these tokens is dropped.
    #[serde(default = "default_disallowed_symbols")]
    pub disallowed_symbols: Vec<String>,
    #[serde(default)]
    pub min_tvl: f64,
}

fn default_required_symbols() -> Vec<String> {
    vec!["USDT".to_string(), "USDC".to_string()]
}

fn default_disallowed_symbols() -> Vec<String> {
    vec!["WETH".to_string()]
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            required_symbols: default_required_symbols(),
            disallowed_symbols: default_disallowed_symbols(),
            min_tvl: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormatConfig {
    #[serde(default = "default_hot_apr")]
    pub hot_apr: f64,
    #[serde(default = "default_high_apr")]
    pub high_apr: f64,
    #[serde(default = "default_mid_apr")]
    pub mid_apr: f64,
}

fn default_hot_apr() -> f64 { 200.0 }
fn default_high_apr() -> f64 { 100.0 }
fn default_mid_apr() -> f64 { 50.0 }

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            hot_apr: default_hot_apr(),
            high_apr: default_high_apr(),
            mid_apr: default_mid_apr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub kyberswap: KyberSwapConfig,
    #[serde(default)]
    pub dexscreener: DexScreenerConfig,
    #[serde(default)]
    pub binance: BinanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KyberSwapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_kyber_url")]
    pub base_url: String,
    #[serde(default = "default_chain_ids")]
    pub chain_ids: Vec<u64>,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_kyber_detail_url")]
    pub detail_url_base: String,
}

fn default_true() -> bool { true }
fn default_kyber_url() -> String {
    "https://zap-earn-service-v3.kyberengineering.io/api/v1/explorer/pools".to_string()
}
fn default_chain_ids() -> Vec<u64> { vec![56, 8453] }
fn default_pages() -> u32 { 10 }
fn default_page_size() -> u32 { 10 }
fn default_page_delay_ms() -> u64 { 500 }
fn default_source_timeout() -> u64 { 30 }
fn default_kyber_detail_url() -> String { "https://kyberswap.com/earn/pools".to_string() }

impl Default for KyberSwapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_kyber_url(),
            chain_ids: default_chain_ids(),
            pages: default_pages(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            timeout_secs: default_source_timeout(),
            detail_url_base: default_kyber_detail_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DexScreenerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dexscreener_url")]
    pub search_url: String,
    /// Search terms tried in order until one yields pools.
    #[serde(default = "default_dexscreener_queries")]
    pub queries: Vec<String>,
    #[serde(default = "default_dexscreener_tokens_url")]
    pub tokens_url: String,
    /// Token contracts looked up after the searches come back empty.
    #[serde(default = "default_dexscreener_token_addresses")]
    pub token_addresses: Vec<String>,
    /// Chain slugs to keep; empty keeps every chain.
    #[serde(default = "default_dexscreener_chains")]
    pub chains: Vec<String>,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_dexscreener_detail_url")]
    pub detail_url_base: String,
}

fn default_dexscreener_url() -> String {
    "https://api.dexscreener.com/latest/dex/search".to_string()
}
fn default_dexscreener_queries() -> Vec<String> {
    vec!["USDT".to_string(), "USDC".to_string()]
}
fn default_dexscreener_tokens_url() -> String {
    "https://api.dexscreener.com/latest/dex/tokens".to_string()
}
fn default_dexscreener_token_addresses() -> Vec<String> {
    vec![
        "0x55d398326f99059fF775485246999027B3197955".to_string(), // BSC USDT
        "0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56".to_string(), // BSC BUSD
        "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c".to_string(), // BSC WBNB
    ]
}
fn default_dexscreener_chains() -> Vec<String> {
    vec!["bsc".to_string(), "base".to_string()]
}
fn default_retry_base_ms() -> u64 { 2000 }
fn default_dexscreener_detail_url() -> String { "https://dexscreener.com".to_string() }

impl Default for DexScreenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_url: default_dexscreener_url(),
            queries: default_dexscreener_queries(),
            tokens_url: default_dexscreener_tokens_url(),
            token_addresses: default_dexscreener_token_addresses(),
            chains: default_dexscreener_chains(),
            timeout_secs: default_source_timeout(),
            retry_base_ms: default_retry_base_ms(),
            detail_url_base: default_dexscreener_detail_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BinanceConfig {
    #[serde(default = "default_binance_url")]
    pub ticker_url: String,
    #[serde(default = "default_binance_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_binance_url() -> String { "https://api.binance.com/api/v3/ticker/24hr".to_string() }
fn default_binance_timeout() -> u64 { 10 }

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            ticker_url: default_binance_url(),
            timeout_secs: default_binance_timeout(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    #[serde(default = "default_telegram_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_unit_ms")]
    pub retry_unit_ms: u64,
}

fn default_telegram_api() -> String { "https://api.telegram.org".to_string() }
fn default_telegram_timeout() -> u64 { 45 }
fn default_retry_unit_ms() -> u64 { 2000 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_telegram_api(),
            timeout_secs: default_telegram_timeout(),
            retry_unit_ms: default_retry_unit_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookKind {
    ServerChan,
    WxPusher,
    WeCom,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_webhook_kind")]
    pub kind: WebhookKind,
    /// ServerChan send key or WxPusher app token.
    #[serde(default)]
    pub api_key: String,
    /// WxPusher recipient uid.
    #[serde(default)]
    pub uid: String,
    /// Full WeCom robot URL; built from `webhook_key` when empty.
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub webhook_key: String,
    #[serde(default = "default_webhook_title")]
    pub title: String,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_unit_ms")]
    pub retry_unit_ms: u64,
}

fn default_webhook_kind() -> WebhookKind { WebhookKind::ServerChan }
fn default_webhook_title() -> String { "New pool alert".to_string() }

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: default_webhook_kind(),
            api_key: String::new(),
            uid: String::new(),
            webhook_url: String::new(),
            webhook_key: String::new(),
            title: default_webhook_title(),
            timeout_secs: default_source_timeout(),
            retry_unit_ms: default_retry_unit_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_send_pause_ms")]
    pub send_pause_ms: u64,
    #[serde(default)]
    pub button_text: String,
    #[serde(default)]
    pub button_url: String,
}

fn default_monitor_interval() -> u64 { 30 }
fn default_send_pause_ms() -> u64 { 1000 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval(),
            send_pause_ms: default_send_pause_ms(),
            button_text: String::new(),
            button_url: String::new(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResetConfig {
    /// Local time of day, `HH:MM`.
    #[serde(default = "default_reset_at")]
    pub at: String,
}

fn default_reset_at() -> String { "00:00".to_string() }

impl Default for ResetConfig {
    fn default() -> Self {
        Self { at: default_reset_at() }
    }
}

impl ResetConfig {
    pub fn time_of_day(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.at.trim(), "%H:%M")
            .map_err(|_| ConfigError::InvalidTime(self.at.clone()))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlphaConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_alpha_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_min_change")]
    pub min_change_pct: f64,
    #[serde(default = "default_min_quote_volume")]
    pub min_quote_volume: f64,
}

fn default_alpha_interval() -> u64 { 60 }
fn default_min_change() -> f64 { 10.0 }
fn default_min_quote_volume() -> f64 { 10_000_000.0 }

impl Default for AlphaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_alpha_interval(),
            min_change_pct: default_min_change(),
            min_quote_volume: default_min_quote_volume(),
        }
    }
}

impl Config {
    /// Loads `$POOL_NOTIFIER_CONFIG` (or `./config.toml`) and applies env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("POOL_NOTIFIER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            tracing::warn!("⚠️ {} not found, using defaults", path);
            Config::default()
        };

        config.apply_env();
        config.reset.time_of_day()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(token) = non_empty_env("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(chat) = non_empty_env("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = chat;
        }
        if let Some(key) = non_empty_env("WEBHOOK_API_KEY") {
            self.webhook.api_key = key;
        }
        if let Some(url) = non_empty_env("WEBHOOK_URL") {
            self.webhook.webhook_url = url;
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.filter.required_symbols, vec!["USDT", "USDC"]);
        assert_eq!(config.filter.disallowed_symbols, vec!["WETH"]);
        assert_eq!(config.sources.kyberswap.chain_ids, vec![56, 8453]);
        assert_eq!(config.monitor.interval_secs, 30);
        assert!(!config.alpha.enabled);
        assert!(!config.webhook.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [filter]
            required_symbols = ["USDT"]

            [sources.kyberswap]
            pages = 3

            [webhook]
            enabled = true
            kind = "wecom"
            webhook_key = "abc"

            [reset]
            at = "02:30"
            "#,
        )
        .unwrap();

        assert_eq!(config.filter.required_symbols, vec!["USDT"]);
        assert_eq!(config.filter.disallowed_symbols, vec!["WETH"]);
        assert_eq!(config.sources.kyberswap.pages, 3);
        assert_eq!(config.sources.kyberswap.page_size, 10);
        assert_eq!(config.webhook.kind, WebhookKind::WeCom);
        assert_eq!(
            config.reset.time_of_day().unwrap(),
            NaiveTime::from_hms_opt(2, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_reset_time() {
        let reset = ResetConfig { at: "25:99".to_string() };
        assert!(matches!(reset.time_of_day(), Err(ConfigError::InvalidTime(_))));
    }
}
