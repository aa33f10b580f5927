mod api;
mod config;
mod jobs;
mod models;
mod notify;
mod scheduler;
mod services;
mod sources;

use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{create_rest_router, AppState};
use config::Config;
use jobs::{AlphaJob, MonitorJob, ResetJob};
use notify::{Button, ChatNotifier, TelegramClient, WebhookNotifier};
use scheduler::{Schedule, Scheduler};
use services::{MessageFormatter, PoolFilter, PoolNormalizer, SeenPoolStore, SnapshotStore};
use sources::{
    binance::BinanceClient, dexscreener::DexScreenerSource, kyberswap::KyberSwapSource,
    FailoverChain, PoolSource,
};

fn build_sources(config: &Config) -> Result<Vec<Arc<dyn PoolSource>>, sources::SourceError> {
    let filter = PoolFilter::new(&config.filter);
    let mut list: Vec<Arc<dyn PoolSource>> = Vec::new();

    let kyber = &config.sources.kyberswap;
    if kyber.enabled {
        let normalizer = PoolNormalizer::new("kyberswap", kyber.detail_url_base.as_str(), filter.clone());
        list.push(Arc::new(KyberSwapSource::new(kyber.clone(), normalizer)?));
    }

    let dex = &config.sources.dexscreener;
    if dex.enabled {
        let normalizer = PoolNormalizer::new("dexscreener", dex.detail_url_base.as_str(), filter);
        list.push(Arc::new(DexScreenerSource::new(dex.clone(), normalizer)?));
    }

    Ok(list)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}

#[tokio::main(worker_threads = 4)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pool_notifier=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("\n🚀 Pool Notifier Starting...\n");

    let config = Config::load()?;
    tracing::info!("✓ Configuration loaded");

    // Sources, in failover priority order
    let chain = Arc::new(FailoverChain::new(build_sources(&config)?));
    tracing::info!("✓ Sources: {:?}", chain.source_names());

    let seen = Arc::new(SeenPoolStore::new(&config.storage.data_dir));
    let snapshot = Arc::new(SnapshotStore::new(&config.storage.data_dir));
    let formatter = MessageFormatter::new(&config.format);

    // Notifiers
    let telegram = Arc::new(TelegramClient::new(&config.telegram)?);
    if !telegram.has_token() || telegram.default_chat().is_empty() {
        tracing::warn!("⚠️ Telegram bot token or chat id missing, Telegram alerts will be skipped");
    }
    let mut notifiers: Vec<Arc<dyn ChatNotifier>> = vec![telegram.clone()];
    if config.webhook.enabled {
        let webhook = WebhookNotifier::new(&config.webhook)?;
        tracing::info!("✓ Webhook notifier enabled ({})", webhook.name());
        notifiers.push(Arc::new(webhook));
    }

    let send_pause = Duration::from_millis(config.monitor.send_pause_ms);
    let mut scheduler = Scheduler::new();

    let monitor = MonitorJob::new(
        chain.clone(),
        seen.clone(),
        snapshot.clone(),
        formatter.clone(),
        notifiers.clone(),
    )
    .with_button(Button::from_parts(&config.monitor.button_text, &config.monitor.button_url))
    .with_send_pause(send_pause);
    scheduler.register(Schedule::Every(config.monitor.interval()), Arc::new(monitor));

    scheduler.register(
        Schedule::DailyAt(config.reset.time_of_day()?),
        Arc::new(ResetJob::new(seen.clone(), config.storage.retain_days)),
    );

    if config.alpha.enabled {
        let binance = Arc::new(BinanceClient::new(&config.sources.binance)?);
        let alpha = AlphaJob::new(binance, formatter.clone(), notifiers.clone(), &config.alpha)
            .with_send_pause(send_pause);
        scheduler.register(
            Schedule::Every(Duration::from_secs(config.alpha.interval_secs.max(1))),
            Arc::new(alpha),
        );
    }

    println!("\n📥 Starting jobs (monitor every {}s)...\n", config.monitor.interval_secs);
    scheduler.start();

    let state = Arc::new(AppState {
        chain,
        seen,
        snapshot,
        telegram,
        formatter,
        started_at: chrono::Utc::now(),
    });

    let app = create_rest_router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    println!("\n✓ Server ready on http://{}\n", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    Ok(())
}
