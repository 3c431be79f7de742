use crate::config::{EmailConfig, ServerConfig};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use webscore_alert::{ConsistencyWindow, EventDetector};
use webscore_common::slug::url_slug;
use webscore_common::types::{MetricSpec, UrlRow};
use webscore_notify::channels::email::EmailChannel;
use webscore_notify::channels::log::LogChannel;
use webscore_notify::dispatcher::Dispatcher;
use webscore_notify::NotificationChannel;
use webscore_score::aggregate::aggregate;
use webscore_score::fetcher::SeriesFetcher;
use webscore_score::leaderboard::{rank_rows, RankMode};
use webscore_storage::snapshot::SnapshotStore;
use webscore_storage::subscribers::SubscriberRegistry;
use webscore_storage::TimeSeriesStore;

/// Counts describing one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub urls: usize,
    pub ranked: usize,
    pub persisted: usize,
    pub baseline: usize,
    pub events: usize,
    pub sent: usize,
    pub failed: usize,
}

/// One scoring and alerting pass over the whole catalog.
pub struct Runner {
    catalog: Vec<MetricSpec>,
    fetcher: SeriesFetcher,
    snapshots: SnapshotStore,
    subscribers: SubscriberRegistry,
    detector: EventDetector,
    dispatcher: Dispatcher,
    consistency_days: usize,
    reconstruction_anchor: usize,
}

impl Runner {
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn TimeSeriesStore>,
        channels: Vec<Box<dyn NotificationChannel>>,
    ) -> Self {
        Self {
            catalog: config.metrics.clone(),
            fetcher: SeriesFetcher::new(store.clone(), config.query_timeout()),
            snapshots: SnapshotStore::new(store.clone(), config.leaderboard_database.clone())
                .with_timeout(config.query_timeout()),
            subscribers: SubscriberRegistry::new(store, config.leaderboard_database.clone())
                .with_timeout(config.query_timeout()),
            detector: EventDetector::new(config.detector_config()),
            dispatcher: Dispatcher::new(channels),
            consistency_days: config.alert.consistency_days,
            reconstruction_anchor: config.alert.reconstruction_anchor,
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// Runs as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Fails only when today's snapshot cannot be written in time. Query, baseline,
    /// registry and delivery failures are logged and degrade the run.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        if self.catalog.is_empty() {
            tracing::warn!("Metric catalog is empty, leaderboard will be empty");
        }

        let results = self.fetcher.fetch_all(&self.catalog, now).await;
        let rows: Vec<UrlRow> = aggregate(&results)
            .into_iter()
            .map(|row| {
                let slug = url_slug(&row.url);
                row.rekeyed(slug)
            })
            .collect();

        let inclusive = rank_rows(&rows, RankMode::Inclusive);
        let today = rank_rows(&rows, RankMode::Exclusive);
        let window = ConsistencyWindow::from_rows(
            today.clone(),
            &rows,
            self.consistency_days,
            self.reconstruction_anchor,
        );

        // read before writing so today's snapshot is never its own baseline
        let baseline = self.snapshots.fetch_last_week(now).await;
        let persisted = self
            .snapshots
            .persist(&inclusive, now)
            .await
            .context("Failed to persist leaderboard snapshot")?;

        let mut report = RunReport {
            urls: rows.len(),
            ranked: today.len(),
            persisted,
            baseline: baseline.len(),
            ..RunReport::default()
        };

        let subscribers = self.subscribers.load().await;
        if subscribers.is_empty() {
            tracing::info!("No subscriptions registered, skipping event detection");
            return Ok(report);
        }
        if baseline.is_empty() {
            tracing::info!("No leaderboard snapshot found for last week");
            return Ok(report);
        }

        let events = self.detector.detect(&today, &baseline, &window);
        let summary = self.dispatcher.dispatch(&events, &subscribers).await;
        report.events = summary.events;
        report.sent = summary.sent;
        report.failed = summary.failed;

        tracing::info!(
            urls = report.urls,
            persisted = report.persisted,
            events = report.events,
            sent = report.sent,
            failed = report.failed,
            "Leaderboard run finished"
        );
        Ok(report)
    }
}

/// Email when enabled, otherwise the logging channel.
pub fn build_channels(email: &EmailConfig) -> Result<Vec<Box<dyn NotificationChannel>>> {
    if !email.enabled {
        tracing::info!("Email disabled, notifications go to the log");
        return Ok(vec![Box::new(LogChannel)]);
    }
    let channel = EmailChannel::new(
        &email.smtp_host,
        email.smtp_port,
        email.smtp_username.as_deref(),
        email.smtp_password.as_deref(),
        &email.from,
    )
    .context("Failed to build email channel")?;
    Ok(vec![Box::new(channel)])
}
