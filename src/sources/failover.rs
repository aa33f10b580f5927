use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use serde::Serialize;
use crate::models::PoolRecord;
use super::{PoolSource, SourceError};

#[derive(Debug)]
pub struct FetchOutcome {
    pub source: &'static str,
    pub pools: Vec<PoolRecord>,
}

#[derive(Debug, Default)]
pub struct FetchStats {
    pub total_requests: AtomicU64,
    pub successful: AtomicU64,
    pub failed: AtomicU64,
    pub pools_collected: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchStatsSnapshot {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub pools_collected: u64,
}

/// Providers in priority order. The first non-empty answer wins; results are never merged.
pub struct FailoverChain {
    sources: Vec<Arc<dyn PoolSource>>,
    stats: FetchStats,
}

impl FailoverChain {
    pub fn new(sources: Vec<Arc<dyn PoolSource>>) -> Self {
        Self {
            sources,
            stats: FetchStats::default(),
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn fetch(&self) -> Result<FetchOutcome, SourceError> {
        let mut last_failure = String::from("no sources configured");

        for source in &self.sources {
            self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
            match source.fetch_pools().await {
                Ok(pools) if !pools.is_empty() => {
                    self.stats.successful.fetch_add(1, Ordering::Relaxed);
                    self.stats.pools_collected.fetch_add(pools.len() as u64, Ordering::Relaxed);
                    return Ok(FetchOutcome {
                        source: source.name(),
                        pools,
                    });
                }
                Ok(_) => {
                    self.stats.successful.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("⚠️ {} returned no pools, trying next source", source.name());
                    last_failure = format!("{}: empty result", source.name());
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("⚠️ {} failed: {}, trying next source", source.name(), e);
                    last_failure = format!("{}: {}", source.name(), e);
                }
            }
        }

        Err(SourceError::Exhausted(last_failure))
    }

    pub fn stats(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            total_requests: self.stats.total_requests.load(Ordering::Relaxed),
            successful: self.stats.successful.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            pools_collected: self.stats.pools_collected.load(Ordering::Relaxed),
        }
    }
}
