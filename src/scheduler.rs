use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, NaiveTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// First run immediately, then every interval after the previous run ends.
    Every(Duration),
    /// Once a day at this local time.
    DailyAt(NaiveTime),
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self);
}

/// Time from `now` until the next occurrence of `at`. Equal times roll to tomorrow.
pub fn duration_until(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// One task per job; a job never overlaps with itself.
pub struct Scheduler {
    jobs: Vec<(Schedule, Arc<dyn Job>)>,
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            stop_tx,
            handles: Vec::new(),
        }
    }

    pub fn register(&mut self, schedule: Schedule, job: Arc<dyn Job>) {
        tracing::info!("⏰ Registered job '{}' ({:?})", job.name(), schedule);
        self.jobs.push((schedule, job));
    }

    pub fn start(&mut self) {
        for (schedule, job) in self.jobs.drain(..) {
            let stop_rx = self.stop_tx.subscribe();
            self.handles.push(tokio::spawn(run_loop(schedule, job, stop_rx)));
        }
    }

    /// Signals every loop to stop and waits for in-flight runs to finish.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("❌ Job task ended abnormally: {}", e);
            }
        }
        tracing::info!("⏹️ Scheduler stopped");
    }
}

async fn run_loop(schedule: Schedule, job: Arc<dyn Job>, mut stop_rx: watch::Receiver<bool>) {
    let mut first = true;
    loop {
        let wait = match schedule {
            Schedule::Every(_) if first => Duration::ZERO,
            Schedule::Every(interval) => interval,
            Schedule::DailyAt(at) => duration_until(Local::now().naive_local(), at),
        };
        first = false;

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop_rx.changed() => break,
        }
        if *stop_rx.borrow() {
            break;
        }

        tracing::debug!("▶️ Running job '{}'", job.name());
        job.run().await;
    }
    tracing::debug!("Job '{}' loop exited", job.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_duration_until() {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        assert_eq!(duration_until(at(23, 59, 0), midnight), Duration::from_secs(60));
        assert_eq!(duration_until(at(0, 0, 0), midnight), Duration::from_secs(86_400));

        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(duration_until(at(8, 0, 0), nine), Duration::from_secs(3600));
    }

    struct CountingJob {
        runs: AtomicU32,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_every_runs_immediately_and_stops() {
        let job = Arc::new(CountingJob { runs: AtomicU32::new(0) });
        let mut scheduler = Scheduler::new();
        scheduler.register(Schedule::Every(Duration::from_secs(3600)), job.clone());
        scheduler.start();

        for _ in 0..100 {
            if job.runs.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.stop().await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }
}
