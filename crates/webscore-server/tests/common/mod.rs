#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use webscore_common::types::{EventKind, NotificationEvent, RankEntry, RankedList};
use webscore_notify::NotificationChannel;
use webscore_server::config::ServerConfig;
use webscore_server::runner::Runner;
use webscore_storage::bootstrap::ensure_database;
use webscore_storage::engine::SqliteTimeSeriesStore;
use webscore_storage::snapshot::SnapshotStore;
use webscore_storage::subscribers::SubscriberRegistry;
use webscore_storage::{Point, TimeSeriesStore};

pub const METRIC_DB: &str = "lighthouse";
pub const LEADERBOARD_DB: &str = "leaderboard";

/// (kind, url, recipient) of every delivery.
pub type Deliveries = Arc<Mutex<Vec<(EventKind, String, String)>>>;

#[derive(Clone, Default)]
pub struct RecordingChannel {
    pub deliveries: Deliveries,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, event: &NotificationEvent, recipient: &str) -> Result<()> {
        self.deliveries
            .lock()
            .unwrap()
            .push((event.kind, event.url.clone(), recipient.to_string()));
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteTimeSeriesStore>,
    pub config: ServerConfig,
    pub now: DateTime<Utc>,
    pub deliveries: Deliveries,
}

pub async fn build_test_context() -> Result<TestContext> {
    build_context(true).await
}

/// Like [`build_test_context`] but without the leaderboard database.
pub async fn build_context_without_leaderboard() -> Result<TestContext> {
    build_context(false).await
}

async fn build_context(with_leaderboard: bool) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteTimeSeriesStore::new(temp_dir.path())?);
    store.create_database(METRIC_DB).await?;
    if with_leaderboard {
        ensure_database(store.as_ref(), LEADERBOARD_DB).await?;
    }

    let config: ServerConfig = toml::from_str(&format!(
        r#"
        data_dir = "{}"
        leaderboard_database = "{LEADERBOARD_DB}"

        [store]
        query_timeout_secs = 10

        [[metrics]]
        name = "performance"
        measurement = "lighthouse"
        field = "performance"
        database = "{METRIC_DB}"
        thresholds = [50, 90]
        important = true
        "#,
        temp_dir.path().display()
    ))?;

    Ok(TestContext {
        temp_dir,
        store,
        config,
        now: Utc::now(),
        deliveries: Deliveries::default(),
    })
}

impl TestContext {
    pub fn runner(&self) -> Runner {
        let channel = RecordingChannel {
            deliveries: self.deliveries.clone(),
        };
        Runner::new(&self.config, self.store.clone(), vec![Box::new(channel)])
    }

    /// Writes one daily sample per day for the last 30 days. `history`
    /// overrides the value `days_ago` days back; day 0 is today's value.
    pub async fn seed_site(&self, url: &str, today: f64, history: &[(i64, f64)]) -> Result<()> {
        let overrides: BTreeMap<i64, f64> = history.iter().copied().collect();
        let points: Vec<Point> = (0..30)
            .map(|days_ago| {
                let value = overrides.get(&days_ago).copied().unwrap_or(today);
                Point {
                    measurement: "lighthouse".to_string(),
                    tags: BTreeMap::from([("url".to_string(), url.to_string())]),
                    fields: BTreeMap::from([("performance".to_string(), value)]),
                    timestamp: self.now - Duration::days(days_ago) - Duration::hours(1),
                }
            })
            .collect();
        self.store.write_points(METRIC_DB, &points).await?;
        Ok(())
    }

    /// Stores a leaderboard snapshot taken `days_ago` days before now.
    pub async fn seed_snapshot(&self, entries: &[(&str, i64)], days_ago: i64) -> Result<()> {
        let list = RankedList::new(
            entries
                .iter()
                .map(|(url, score)| RankEntry {
                    url: url.to_string(),
                    score: *score,
                })
                .collect(),
        );
        SnapshotStore::new(self.store.clone(), LEADERBOARD_DB)
            .persist(&list, self.now - Duration::days(days_ago))
            .await?;
        Ok(())
    }

    pub async fn subscribe(&self, url: &str, email: &str, active: bool) -> Result<()> {
        SubscriberRegistry::new(self.store.clone(), LEADERBOARD_DB)
            .update_subscription(url, email, active, self.now - Duration::days(1))
            .await?;
        Ok(())
    }

    pub fn delivered(&self) -> Vec<(EventKind, String, String)> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn delivered_kinds(&self, url: &str) -> Vec<EventKind> {
        self.delivered()
            .into_iter()
            .filter(|(_, u, _)| u == url)
            .map(|(kind, _, _)| kind)
            .collect()
    }
}
