use crate::runner::Runner;
use std::sync::Arc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Triggers a run every `interval_secs`. Runs never overlap: the next tick
/// is awaited only after the previous run returned.
pub struct RunScheduler {
    runner: Arc<Runner>,
    interval_secs: u64,
}

impl RunScheduler {
    pub fn new(runner: Arc<Runner>, interval_secs: u64) -> Self {
        Self {
            runner,
            interval_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(interval_secs = self.interval_secs, "Leaderboard scheduler started");

        let period = Duration::from_secs(self.interval_secs.max(1));
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            match self.runner.run().await {
                Ok(report) => tracing::debug!(?report, "Scheduled run completed"),
                Err(e) => tracing::error!(error = %e, "Scheduled run failed"),
            }
        }
    }
}
