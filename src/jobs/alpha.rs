use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use crate::config::AlphaConfig;
use crate::models::AlphaTicker;
use crate::notify::ChatNotifier;
use crate::scheduler::Job;
use crate::services::MessageFormatter;
use crate::sources::TickerSource;
use super::broadcast;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AlphaReport {
    pub new_listings: Vec<AlphaTicker>,
    pub movers: Vec<AlphaTicker>,
}

impl AlphaReport {
    pub fn is_empty(&self) -> bool {
        self.new_listings.is_empty() && self.movers.is_empty()
    }
}

/// Watches spot tickers for new listings and large 24h moves.
pub struct AlphaJob {
    source: Arc<dyn TickerSource>,
    formatter: MessageFormatter,
    notifiers: Vec<Arc<dyn ChatNotifier>>,
    min_change_pct: f64,
    min_quote_volume: f64,
    send_pause: Duration,
    /// symbol -> last price seen
    known: DashMap<String, f64>,
    active_movers: Mutex<HashSet<String>>,
    seeded: AtomicBool,
}

impl AlphaJob {
    pub fn new(
        source: Arc<dyn TickerSource>,
        formatter: MessageFormatter,
        notifiers: Vec<Arc<dyn ChatNotifier>>,
        config: &AlphaConfig,
    ) -> Self {
        Self {
            source,
            formatter,
            notifiers,
            min_change_pct: config.min_change_pct,
            min_quote_volume: config.min_quote_volume,
            send_pause: Duration::from_secs(1),
            known: DashMap::new(),
            active_movers: Mutex::new(HashSet::new()),
            seeded: AtomicBool::new(false),
        }
    }

    pub fn with_send_pause(mut self, pause: Duration) -> Self {
        self.send_pause = pause;
        self
    }

    fn is_mover(&self, t: &AlphaTicker) -> bool {
        t.price_change_percent.abs() >= self.min_change_pct && t.quote_volume >= self.min_quote_volume
    }

    /// Updates known symbols and the mover set, returning what should be announced.
    pub fn classify(&self, tickers: &[AlphaTicker]) -> AlphaReport {
        let seeding = !self.seeded.swap(true, Ordering::SeqCst);
        let mut report = AlphaReport::default();

        for t in tickers {
            let is_new = self.known.insert(t.symbol.clone(), t.last_price).is_none();
            if is_new && !seeding {
                report.new_listings.push(t.clone());
            }
        }

        let current: HashSet<String> = tickers
            .iter()
            .filter(|t| self.is_mover(t))
            .map(|t| t.symbol.clone())
            .collect();

        {
            let mut active = self.active_movers.lock();
            report.movers = tickers
                .iter()
                .filter(|t| current.contains(&t.symbol) && !active.contains(&t.symbol))
                .cloned()
                .collect();
            *active = current;
        }

        report.movers.sort_by(|a, b| {
            b.price_change_percent
                .abs()
                .total_cmp(&a.price_change_percent.abs())
        });
        report
    }

    pub async fn tick(&self) -> AlphaReport {
        let tickers = match self.source.fetch_tickers().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("❌ Binance ticker fetch failed: {}", e);
                return AlphaReport::default();
            }
        };

        let report = self.classify(&tickers);
        if report.is_empty() {
            tracing::debug!("  alpha: nothing new across {} tickers", tickers.len());
            return report;
        }

        tracing::info!(
            listings = report.new_listings.len(),
            movers = report.movers.len(),
            "alpha signals detected"
        );
        broadcast(
            &self.notifiers,
            |style| self.formatter.format_alpha(&report.new_listings, &report.movers, style),
            None,
            self.send_pause,
        )
        .await;
        report
    }
}

#[async_trait]
impl Job for AlphaJob {
    fn name(&self) -> &'static str {
        "binance-alpha"
    }

    async fn run(&self) {
        self.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatConfig;
    use crate::notify::tests::RecordingNotifier;
    use crate::services::MessageStyle;
    use crate::sources::SourceError;

    fn ticker(symbol: &str, change: f64, volume: f64) -> AlphaTicker {
        AlphaTicker {
            symbol: symbol.to_string(),
            last_price: 1.0,
            price_change_percent: change,
            quote_volume: volume,
        }
    }

    struct ScriptedTickers(Mutex<Vec<Vec<AlphaTicker>>>);

    #[async_trait]
    impl TickerSource for ScriptedTickers {
        async fn fetch_tickers(&self) -> Result<Vec<AlphaTicker>, SourceError> {
            let mut script = self.0.lock();
            if script.is_empty() {
                Err(SourceError::RateLimit)
            } else {
                Ok(script.remove(0))
            }
        }
    }

    fn job(script: Vec<Vec<AlphaTicker>>, notifier: Arc<RecordingNotifier>) -> AlphaJob {
        AlphaJob::new(
            Arc::new(ScriptedTickers(Mutex::new(script))),
            MessageFormatter::new(&FormatConfig::default()),
            vec![notifier],
            &AlphaConfig::default(),
        )
        .with_send_pause(Duration::ZERO)
    }

    #[test]
    fn test_first_tick_seeds_listings_silently() {
        let j = job(vec![], Arc::new(RecordingNotifier::new(MessageStyle::Plain, 4096)));
        let first = j.classify(&[ticker("AUSDT", 1.0, 1.0), ticker("BUSDT", 1.0, 1.0)]);
        assert!(first.is_empty());

        let second = j.classify(&[ticker("AUSDT", 1.0, 1.0), ticker("CUSDT", 1.0, 1.0)]);
        assert_eq!(second.new_listings.len(), 1);
        assert_eq!(second.new_listings[0].symbol, "CUSDT");
    }

    #[test]
    fn test_movers_are_edge_triggered() {
        let j = job(vec![], Arc::new(RecordingNotifier::new(MessageStyle::Plain, 4096)));
        let big = ticker("XUSDT", -15.0, 50_000_000.0);
        let thin = ticker("YUSDT", 40.0, 1_000.0);

        assert_eq!(j.classify(&[big.clone(), thin.clone()]).movers, vec![big.clone()]);
        assert!(j.classify(&[big.clone()]).movers.is_empty());

        let calm = ticker("XUSDT", -2.0, 50_000_000.0);
        assert!(j.classify(&[calm]).movers.is_empty());
        assert_eq!(j.classify(&[big.clone()]).movers, vec![big]);
    }

    #[tokio::test]
    async fn test_tick_notifies_and_survives_fetch_errors() {
        let notifier = Arc::new(RecordingNotifier::new(MessageStyle::Markdown, 4096));
        let j = job(
            vec![
                vec![ticker("AUSDT", 1.0, 1.0)],
                vec![ticker("AUSDT", 1.0, 1.0), ticker("NEWUSDT", 30.0, 20_000_000.0)],
            ],
            notifier.clone(),
        );

        assert!(j.tick().await.is_empty());
        let report = j.tick().await;
        assert_eq!(report.new_listings.len(), 1);
        assert_eq!(report.movers.len(), 1);
        assert_eq!(notifier.sent.lock().len(), 1);

        // script exhausted: fetch error yields an empty report
        assert!(j.tick().await.is_empty());
        assert_eq!(notifier.sent.lock().len(), 1);
    }
}
