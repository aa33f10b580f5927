use std::fmt::Write as _;
use crate::config::FormatConfig;
use crate::models::{AlphaTicker, PoolRecord};

const MARKDOWN_DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━";
const PLAIN_DIVIDER: &str = "---";

/// How a notifier wants its text rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    /// Telegram legacy Markdown.
    Markdown,
    /// No markup, for webhook chat services.
    Plain,
}

pub fn format_apr(apr: f64) -> String {
    if (100.0..1000.0).contains(&apr) {
        format!("{:.1}%", apr)
    } else {
        format!("{:.2}%", apr)
    }
}

pub fn format_usd(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.2}K", value / 1_000.0)
    } else {
        format!("${:.2}", value)
    }
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("${:.4}", price)
    } else {
        format!("${:.8}", price)
    }
}

/// Escapes characters that legacy Telegram Markdown treats as markup.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// (marker, display name) for a pool's chain.
pub fn chain_label(pool: &PoolRecord) -> (&'static str, String) {
    let known = match pool.chain_id {
        Some(56) => Some(("🟡", "BSC")),
        Some(8453) => Some(("🔵", "Base")),
        Some(1) => Some(("💠", "Ethereum")),
        Some(42161) => Some(("🔷", "Arbitrum")),
        _ => match pool.chain_name.to_lowercase().as_str() {
            "bsc" | "bnb" => Some(("🟡", "BSC")),
            "base" => Some(("🔵", "Base")),
            "ethereum" | "eth" => Some(("💠", "Ethereum")),
            "arbitrum" => Some(("🔷", "Arbitrum")),
            _ => None,
        },
    };

    match (known, pool.chain_id) {
        (Some((marker, name)), _) => (marker, name.to_string()),
        (None, _) if !pool.chain_name.is_empty() => ("⚪", pool.chain_name.clone()),
        (None, Some(id)) => ("⚪", format!("Chain {}", id)),
        (None, None) => ("⚪", "Unknown".to_string()),
    }
}

pub fn protocol_label(protocol: &str, version: &str) -> String {
    let lower = protocol.to_lowercase();
    let v4 = version.contains('4');
    let (marker, name) = if lower.contains("uniswap") {
        (if v4 { "🟢" } else { "🟠" }, "Uniswap")
    } else if lower.contains("pancake") {
        (if v4 { "🟣" } else { "🟡" }, "Pancake")
    } else if lower.contains("kyber") {
        (if v4 { "🔵" } else { "🟠" }, "KyberSwap")
    } else {
        (if v4 { "🟢" } else { "🟠" }, protocol)
    };
    let tag = if v4 { "V4" } else { "V3" };
    if name.is_empty() {
        format!("{} {}", marker, tag)
    } else {
        format!("{} {} {}", marker, name, tag)
    }
}

fn fee_label(fee_tier: f64) -> Option<String> {
    if fee_tier <= 0.0 {
        None
    } else if fee_tier == 0.01 {
        Some("🔵 Fee: 0.01%".to_string())
    } else if fee_tier == 1.0 {
        Some("🟢 Fee: 1%".to_string())
    } else {
        Some(format!("⚪ Fee: {}%", fee_tier))
    }
}

/// Renders pools and tickers into chat messages.
#[derive(Clone)]
pub struct MessageFormatter {
    hot_apr: f64,
    high_apr: f64,
    mid_apr: f64,
}

impl MessageFormatter {
    pub fn new(config: &FormatConfig) -> Self {
        Self {
            hot_apr: config.hot_apr,
            high_apr: config.high_apr,
            mid_apr: config.mid_apr,
        }
    }

    pub fn apr_marker(&self, apr: f64) -> &'static str {
        if apr >= self.hot_apr {
            "🔥"
        } else if apr >= self.high_apr {
            "🟢"
        } else if apr >= self.mid_apr {
            "🟡"
        } else {
            "⚪"
        }
    }

    pub fn format_pool(&self, pool: &PoolRecord, style: MessageStyle) -> String {
        match style {
            MessageStyle::Markdown => self.pool_markdown(pool),
            MessageStyle::Plain => self.pool_plain(pool),
        }
    }

    fn pool_markdown(&self, pool: &PoolRecord) -> String {
        let marker = self.apr_marker(pool.apr);
        let (chain_marker, chain_name) = chain_label(pool);
        let mut out = String::new();

        let _ = writeln!(
            out,
            "{} *{}*  {} {}",
            marker,
            escape_markdown(&pool.name),
            chain_marker,
            escape_markdown(&chain_name)
        );
        // protocol and chain names can be raw upstream slugs
        let mut info = escape_markdown(&protocol_label(&pool.protocol, &pool.version));
        if let Some(fee) = fee_label(pool.fee_tier) {
            info.push_str("    ");
            info.push_str(&fee);
        }
        let _ = writeln!(out, "{}", info);
        let _ = writeln!(out, "💱 *{}*\n", escape_markdown(&pool.pair()));

        let apr = if pool.apr >= self.high_apr {
            format!("*{}*", format_apr(pool.apr))
        } else {
            format_apr(pool.apr)
        };
        let _ = writeln!(out, "💰 *APR:*     {} {}", marker, apr);
        let _ = writeln!(out, "💎 *TVL:*     {}", format_usd(pool.tvl));
        if pool.volume_24h > 0.0 {
            let _ = writeln!(out, "📈 *Volume:*  {}", format_usd(pool.volume_24h));
        }
        if pool.fees_24h > 0.0 {
            let _ = writeln!(out, "💵 *Fees:*    {}", format_usd(pool.fees_24h));
        }
        if !pool.contract_address.is_empty() {
            let _ = writeln!(out, "📝 *Contract:* `{}`", pool.contract_address);
        }
        if !pool.url.is_empty() {
            let _ = writeln!(out, "🔗 [View pool]({})", pool.url);
        }
        out
    }

    fn pool_plain(&self, pool: &PoolRecord) -> String {
        let (_, chain_name) = chain_label(pool);
        let mut out = String::new();

        let _ = writeln!(out, "📊 {}", pool.name);
        let _ = writeln!(out, "💰 APR: {} {}", self.apr_marker(pool.apr), format_apr(pool.apr));
        let _ = writeln!(out, "💎 TVL: {}", format_usd(pool.tvl));
        let _ = writeln!(out, "🔄 Pair: {} / {}", pool.token0.symbol, pool.token1.symbol);
        let _ = writeln!(out, "⛓️ Chain: {}", chain_name);
        let _ = writeln!(out, "🏷️ Protocol: {}", protocol_label(&pool.protocol, &pool.version));
        if let Some(fee) = fee_label(pool.fee_tier) {
            let _ = writeln!(out, "{}", fee);
        }
        if pool.volume_24h > 0.0 {
            let _ = writeln!(out, "📈 24h Volume: {}", format_usd(pool.volume_24h));
        }
        if pool.fees_24h > 0.0 {
            let _ = writeln!(out, "💵 24h Fees: {}", format_usd(pool.fees_24h));
        }
        if !pool.contract_address.is_empty() {
            let _ = writeln!(out, "📝 Contract: {}", pool.contract_address);
        }
        if !pool.url.is_empty() {
            let _ = writeln!(out, "🔗 Details: {}", pool.url);
        }
        out
    }

    /// One message for a batch of pools; empty input renders nothing.
    pub fn format_pools(&self, pools: &[PoolRecord], first_run: bool, style: MessageStyle) -> String {
        if pools.is_empty() {
            return String::new();
        }

        let bold = |s: String| match style {
            MessageStyle::Markdown => format!("*{}*", s),
            MessageStyle::Plain => s,
        };

        let mut out = String::new();
        let banner = match (first_run, pools.len()) {
            (true, 1) => format!("🎉 {}", bold("First run".to_string())),
            (false, 1) => format!("✨ {}", bold("New pool found".to_string())),
            (true, n) => format!("🎉 {}", bold(format!("First run | {} pools", n))),
            (false, n) => format!("✨ {}", bold(format!("{} new pools found", n))),
        };
        out.push_str(&banner);
        out.push_str("\n\n");

        if let [only] = pools {
            out.push_str(&self.format_pool(only, style));
            return out;
        }

        for (i, pool) in pools.iter().enumerate() {
            match style {
                MessageStyle::Markdown => {
                    let _ = write!(out, "*[{}]* ", i + 1);
                }
                MessageStyle::Plain => {
                    let _ = write!(out, "[{}] ", i + 1);
                }
            }
            out.push_str(&self.format_pool(pool, style));
            if i + 1 < pools.len() {
                let divider = match style {
                    MessageStyle::Markdown => MARKDOWN_DIVIDER,
                    MessageStyle::Plain => PLAIN_DIVIDER,
                };
                let _ = write!(out, "{}\n\n", divider);
            }
        }
        out
    }

    /// Alert for new spot listings and large 24h moves.
    pub fn format_alpha(
        &self,
        new_listings: &[AlphaTicker],
        movers: &[AlphaTicker],
        style: MessageStyle,
    ) -> String {
        if new_listings.is_empty() && movers.is_empty() {
            return String::new();
        }

        let bold = |s: &str| match style {
            MessageStyle::Markdown => format!("*{}*", s),
            MessageStyle::Plain => s.to_string(),
        };

        let mut out = format!("🚀 {}\n", bold("Binance alpha"));

        if !new_listings.is_empty() {
            let _ = writeln!(out, "\n🆕 {} ({})", bold("New listings"), new_listings.len());
            for t in new_listings {
                let _ = writeln!(
                    out,
                    "• {}  {}  ({:+.2}%)",
                    t.base_asset(),
                    format_price(t.last_price),
                    t.price_change_percent
                );
            }
        }

        if !movers.is_empty() {
            let _ = writeln!(out, "\n📊 {} ({})", bold("Big movers"), movers.len());
            for t in movers {
                let arrow = if t.price_change_percent >= 0.0 { "🟢" } else { "🔴" };
                let _ = writeln!(
                    out,
                    "{} {} {:+.2}%  {}  Vol {}",
                    arrow,
                    t.base_asset(),
                    t.price_change_percent,
                    format_price(t.last_price),
                    format_usd(t.quote_volume)
                );
            }
        }
        out
    }
}

/// Splits `text` into chunks of at most `limit` characters on line boundaries.
/// Lines longer than `limit` are cut. Concatenating the chunks gives back `text`.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }
    if limit == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let len = line.chars().count();
        if current_len + len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if len <= limit {
            current.push_str(line);
            current_len += len;
            continue;
        }

        for c in line.chars() {
            current.push(c);
            current_len += 1;
            if current_len == limit {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenRef;
    use pretty_assertions::assert_eq;

    fn formatter() -> MessageFormatter {
        MessageFormatter::new(&FormatConfig::default())
    }

    fn sample(id: &str, apr: f64) -> PoolRecord {
        PoolRecord {
            id: id.to_string(),
            name: "CAKE/USDT".to_string(),
            token0: TokenRef::new("CAKE", "0xcake"),
            token1: TokenRef::new("USDT", "0xusdt"),
            tvl: 1_234_567.0,
            volume_24h: 2_500.0,
            fees_24h: 0.0,
            apr,
            fee_tier: 0.01,
            protocol: "Uniswap".to_string(),
            version: "v4".to_string(),
            chain_id: Some(56),
            contract_address: "0xcake".to_string(),
            url: format!("https://kyberswap.com/earn/pools/{}", id),
            source: "kyberswap".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_apr_formatting() {
        assert_eq!(format_apr(99.999), "100.00%");
        assert_eq!(format_apr(150.0), "150.0%");
        assert_eq!(format_apr(1234.5), "1234.50%");
        assert_eq!(format_apr(12.345), "12.35%");
        assert_eq!(format_apr(45.678), "45.68%");
        assert_eq!(format_apr(150.2), "150.2%");
        assert_eq!(format_apr(2500.0), "2500.00%");
    }

    #[test]
    fn test_usd_formatting() {
        assert_eq!(format_usd(1_234_567.0), "$1.23M");
        assert_eq!(format_usd(999.0), "$999.00");
        assert_eq!(format_usd(1_500.0), "$1.50K");
        assert_eq!(format_usd(2_300_000.0), "$2.30M");
        assert_eq!(format_usd(850.0), "$850.00");
    }

    #[test]
    fn test_chain_labels() {
        let mut pool = sample("a", 10.0);
        assert_eq!(chain_label(&pool), ("🟡", "BSC".to_string()));
        pool.chain_id = Some(8453);
        assert_eq!(chain_label(&pool), ("🔵", "Base".to_string()));
        pool.chain_id = Some(999);
        assert_eq!(chain_label(&pool), ("⚪", "Chain 999".to_string()));
        pool.chain_id = None;
        pool.chain_name = "base".to_string();
        assert_eq!(chain_label(&pool), ("🔵", "Base".to_string()));
        pool.chain_name = "solana".to_string();
        assert_eq!(chain_label(&pool), ("⚪", "solana".to_string()));
    }

    #[test]
    fn test_protocol_labels() {
        assert_eq!(protocol_label("Uniswap", "v4"), "🟢 Uniswap V4");
        assert_eq!(protocol_label("Pancake", "v3"), "🟡 Pancake V3");
        assert_eq!(protocol_label("KyberSwap", "v3"), "🟠 KyberSwap V3");
        assert_eq!(protocol_label("aerodrome", "v4"), "🟢 aerodrome V4");
        assert_eq!(protocol_label("", "v3"), "🟠 V3");
    }

    #[test]
    fn test_pool_markdown() {
        let text = formatter().format_pool(&sample("0xpool", 250.0), MessageStyle::Markdown);
        assert!(text.starts_with("🔥 *CAKE/USDT*  🟡 BSC\n"));
        assert!(text.contains("🟢 Uniswap V4    🔵 Fee: 0.01%\n"));
        assert!(text.contains("💰 *APR:*     🔥 *250.0%*\n"));
        assert!(text.contains("💎 *TVL:*     $1.23M\n"));
        assert!(text.contains("📈 *Volume:*  $2.50K\n"));
        assert!(!text.contains("Fees:"));
        assert!(text.contains("`0xcake`"));
        assert!(text.contains("(https://kyberswap.com/earn/pools/0xpool)"));
    }

    #[test]
    fn test_markdown_escapes_upstream_slugs() {
        let mut pool = sample("p", 10.0);
        pool.protocol = "thena_fusion".to_string();
        pool.version = "v3".to_string();
        pool.chain_id = None;
        pool.chain_name = "polygon_zkevm".to_string();

        let text = formatter().format_pool(&pool, MessageStyle::Markdown);
        assert!(text.contains("🟠 thena\\_fusion V3"));
        assert!(text.contains("⚪ polygon\\_zkevm\n"));
        assert!(!text.contains("thena_fusion"));

        let plain = formatter().format_pool(&pool, MessageStyle::Plain);
        assert!(plain.contains("🏷️ Protocol: 🟠 thena_fusion V3\n"));
    }

    #[test]
    fn test_apr_not_bold_below_high() {
        let text = formatter().format_pool(&sample("p", 60.0), MessageStyle::Markdown);
        assert!(text.contains("💰 *APR:*     🟡 60.00%\n"));
    }

    #[test]
    fn test_pool_plain_has_no_markup() {
        let text = formatter().format_pool(&sample("p", 10.0), MessageStyle::Plain);
        assert!(!text.contains('*'));
        assert!(text.contains("🔄 Pair: CAKE / USDT\n"));
        assert!(text.contains("⛓️ Chain: BSC\n"));
    }

    #[test]
    fn test_banners() {
        let f = formatter();
        let one = f.format_pools(&[sample("a", 10.0)], false, MessageStyle::Markdown);
        assert!(one.starts_with("✨ *New pool found*\n\n"));
        assert!(!one.contains("*[1]*"));

        let pools = vec![sample("a", 10.0), sample("b", 20.0), sample("c", 30.0)];
        let many = f.format_pools(&pools, false, MessageStyle::Markdown);
        assert!(many.starts_with("✨ *3 new pools found*\n\n*[1]* "));
        assert!(many.contains("*[3]* "));
        assert_eq!(many.matches(MARKDOWN_DIVIDER).count(), 2);

        let first = f.format_pools(&pools, true, MessageStyle::Plain);
        assert!(first.starts_with("🎉 First run | 3 pools\n\n[1] "));
        assert_eq!(first.matches("---\n").count(), 2);

        assert_eq!(f.format_pools(&[], true, MessageStyle::Plain), "");
    }

    #[test]
    fn test_alpha_message() {
        let listing = AlphaTicker {
            symbol: "NEWUSDT".to_string(),
            last_price: 0.5,
            price_change_percent: 3.0,
            quote_volume: 100.0,
        };
        let mover = AlphaTicker {
            symbol: "BTCUSDT".to_string(),
            last_price: 65000.0,
            price_change_percent: -12.5,
            quote_volume: 2_000_000_000.0,
        };
        let text = formatter().format_alpha(&[listing], &[mover], MessageStyle::Markdown);
        assert!(text.starts_with("🚀 *Binance alpha*\n"));
        assert!(text.contains("• NEW  $0.50000000  (+3.00%)\n"));
        assert!(text.contains("🔴 BTC -12.50%  $65000.0000  Vol $2000.00M\n"));
        assert_eq!(formatter().format_alpha(&[], &[], MessageStyle::Plain), "");
    }

    #[test]
    fn test_split_reconstructs_input() {
        let text = "line one\nline two is longer\n\nshort\nlast line without newline";
        for limit in [5, 10, 20, 4096] {
            let chunks = split_message(text, limit);
            assert_eq!(chunks.concat(), text);
            assert!(chunks.iter().all(|c| c.chars().count() <= limit));
        }
        assert_eq!(split_message(text, 4096), vec![text.to_string()]);
    }

    #[test]
    fn test_split_long_alert() {
        let line = format!("{}\n", "x".repeat(49));
        let text = line.repeat(200);
        assert_eq!(text.chars().count(), 10_000);

        let chunks = split_message(&text, 4096);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4096));
        assert!(chunks.iter().all(|c| c.ends_with('\n')));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_breaks_on_lines() {
        let chunks = split_message("aaaa\nbbbb\ncccc\n", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n".to_string(), "cccc\n".to_string()]);
    }

    #[test]
    fn test_split_counts_chars_not_bytes() {
        let text = "━━━━━━\n━━━━━━\n";
        let chunks = split_message(text, 7);
        assert_eq!(chunks, vec!["━━━━━━\n".to_string(), "━━━━━━\n".to_string()]);
        assert!(split_message("", 10).is_empty());
    }
}
