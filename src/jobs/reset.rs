use std::sync::Arc;
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use crate::scheduler::Job;
use crate::services::{SeenPoolStore, StoreError};

/// Clears today's seen window and drops day files past retention.
pub struct ResetJob {
    seen: Arc<SeenPoolStore>,
    retain_days: u32,
}

impl ResetJob {
    pub fn new(seen: Arc<SeenPoolStore>, retain_days: u32) -> Self {
        Self { seen, retain_days }
    }

    /// Returns the number of old day files removed.
    pub fn reset(&self, today: NaiveDate) -> Result<usize, StoreError> {
        self.seen.reset_on(today)?;
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(self.retain_days)))
            .unwrap_or(today);
        self.seen.prune_before(cutoff)
    }
}

#[async_trait]
impl Job for ResetJob {
    fn name(&self) -> &'static str {
        "daily-reset"
    }

    async fn run(&self) {
        let today = Local::now().date_naive();
        match self.reset(today) {
            Ok(pruned) => tracing::info!("🔄 Seen window for {} reset ({} old files pruned)", today, pruned),
            Err(e) => tracing::error!("❌ Daily reset failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::tests::temp_dir;

    #[test]
    fn test_reset_is_idempotent_and_prunes() {
        let dir = temp_dir("reset");
        let seen = Arc::new(SeenPoolStore::new(&dir));
        let today = NaiveDate::from_ymd_opt(2024, 6, 20).unwrap();
        let old = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let recent = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

        seen.add_seen_on(today, ["a", "b"]).unwrap();
        seen.add_seen_on(old, ["x"]).unwrap();
        seen.add_seen_on(recent, ["y"]).unwrap();

        let job = ResetJob::new(seen.clone(), 7);
        assert_eq!(job.reset(today).unwrap(), 1);
        assert!(seen.seen_on(today).unwrap().is_empty());
        assert!(!seen.path_for(old).exists());
        assert_eq!(seen.seen_on(recent).unwrap().len(), 1);

        assert_eq!(job.reset(today).unwrap(), 0);
        assert!(seen.seen_on(today).unwrap().is_empty());
    }
}
