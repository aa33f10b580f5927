use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde::Serialize;
use crate::models::PoolRecord;
use crate::notify::{Button, ChatNotifier};
use crate::scheduler::Job;
use crate::services::{MessageFormatter, SeenPoolStore, SnapshotStore};
use crate::sources::FailoverChain;
use super::broadcast;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub source: Option<&'static str>,
    pub fetched: usize,
    pub new: usize,
    pub chunks_sent: usize,
    pub first_run: bool,
    /// Every source failed; nothing was written.
    pub aborted: bool,
}

/// Fetch, diff against today's seen window, notify, record.
pub struct MonitorJob {
    chain: Arc<FailoverChain>,
    seen: Arc<SeenPoolStore>,
    snapshot: Arc<SnapshotStore>,
    formatter: MessageFormatter,
    notifiers: Vec<Arc<dyn ChatNotifier>>,
    button: Option<Button>,
    send_pause: Duration,
}

impl MonitorJob {
    pub fn new(
        chain: Arc<FailoverChain>,
        seen: Arc<SeenPoolStore>,
        snapshot: Arc<SnapshotStore>,
        formatter: MessageFormatter,
        notifiers: Vec<Arc<dyn ChatNotifier>>,
    ) -> Self {
        Self {
            chain,
            seen,
            snapshot,
            formatter,
            notifiers,
            button: None,
            send_pause: Duration::from_secs(1),
        }
    }

    pub fn with_button(mut self, button: Option<Button>) -> Self {
        self.button = button;
        self
    }

    pub fn with_send_pause(mut self, pause: Duration) -> Self {
        self.send_pause = pause;
        self
    }

    pub async fn tick(&self) -> TickReport {
        let first_run = !self.snapshot.exists();
        let mut report = TickReport {
            first_run,
            ..Default::default()
        };

        let seen = self.seen.seen_today().unwrap_or_else(|e| {
            tracing::error!("❌ Failed to read seen window, treating as empty: {}", e);
            HashSet::new()
        });

        let outcome = match self.chain.fetch().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("❌ Pool fetch failed, tick aborted: {}", e);
                report.aborted = true;
                return report;
            }
        };
        report.source = Some(outcome.source);
        report.fetched = outcome.pools.len();

        let fresh = select_unseen(&outcome.pools, &seen);
        report.new = fresh.len();
        tracing::info!(
            source = outcome.source,
            fetched = report.fetched,
            seen = seen.len(),
            new = report.new,
            "pool diff computed"
        );

        if !fresh.is_empty() {
            report.chunks_sent = broadcast(
                &self.notifiers,
                |style| self.formatter.format_pools(&fresh, first_run, style),
                self.button.as_ref(),
                self.send_pause,
            )
            .await;

            match self.seen.add_seen(fresh.iter().map(|p| p.id.clone())) {
                Ok(added) => tracing::info!("📝 Recorded {} pool ids in today's window", added),
                Err(e) => tracing::error!("❌ Failed to record seen pools: {}", e),
            }
        }

        if let Err(e) = self.snapshot.save(&outcome.pools) {
            tracing::error!("❌ Failed to save snapshot: {}", e);
        }

        report
    }
}

/// Pools whose id is not in `seen`, first occurrence only.
fn select_unseen(pools: &[PoolRecord], seen: &HashSet<String>) -> Vec<PoolRecord> {
    let mut batch = HashSet::new();
    pools
        .iter()
        .filter(|p| !seen.contains(&p.id) && batch.insert(p.id.as_str()))
        .cloned()
        .collect()
}

#[async_trait]
impl Job for MonitorJob {
    fn name(&self) -> &'static str {
        "pool-monitor"
    }

    async fn run(&self) {
        let report = self.tick().await;
        tracing::info!(
            "✓ Monitor tick: {} fetched | {} new | {} chunks sent",
            report.fetched,
            report.new,
            report.chunks_sent
        );
    }
}
