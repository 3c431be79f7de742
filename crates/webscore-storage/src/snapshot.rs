use crate::error::Result;
use crate::{with_timeout, Point, PointQuery, TimeSeriesStore, DEFAULT_CALL_TIMEOUT};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use webscore_common::types::RankedList;

pub const LEADERBOARD_MEASUREMENT: &str = "webscore-leaderboard";

/// How far back the previous snapshot is looked up.
pub const BASELINE_WINDOW_DAYS: i64 = 7;

/// Added to the lookup so a snapshot taken one schedule interval ago is
/// still found when the next run starts slightly late.
pub const BASELINE_SLACK_MINUTES: i64 = 60;

/// Last recorded score per URL; `None` when the stored score is not an integer.
pub type Baseline = BTreeMap<String, Option<i64>>;

/// Reads and writes dated leaderboard snapshots.
pub struct SnapshotStore {
    store: Arc<dyn TimeSeriesStore>,
    database: String,
    timeout: std::time::Duration,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn TimeSeriesStore>, database: impl Into<String>) -> Self {
        Self {
            store,
            database: database.into(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Bounds every store call made by this snapshot store.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Writes one point per entry, all stamped `at`. Returns the number of
    /// points written.
    ///
    /// # Errors
    ///
    /// Any write failure, or a write that exceeds the time limit, is
    /// returned.
    pub async fn persist(&self, ranked: &RankedList, at: DateTime<Utc>) -> Result<usize> {
        let points: Vec<Point> = ranked
            .iter()
            .map(|entry| Point {
                measurement: LEADERBOARD_MEASUREMENT.to_string(),
                tags: BTreeMap::from([
                    ("url".to_string(), entry.url.clone()),
                    ("score".to_string(), entry.score.to_string()),
                ]),
                fields: BTreeMap::from([("date".to_string(), at.timestamp_millis() as f64)]),
                timestamp: at,
            })
            .collect();

        match with_timeout(self.timeout, self.store.write_points(&self.database, &points)).await {
            Ok(()) => {
                tracing::info!(
                    count = points.len(),
                    database = %self.database,
                    "Saved leaderboard snapshot"
                );
                Ok(points.len())
            }
            Err(e) => {
                tracing::error!(
                    count = points.len(),
                    database = %self.database,
                    error = %e,
                    "Failed to save leaderboard snapshot"
                );
                Err(e)
            }
        }
    }

    /// Scores recorded during the week before `now` (plus
    /// [`BASELINE_SLACK_MINUTES`]), latest write per URL.
    ///
    /// Read failures are logged and yield an empty baseline, which callers
    /// treat as "no previous snapshot".
    pub async fn fetch_last_week(&self, now: DateTime<Utc>) -> Baseline {
        let query = PointQuery {
            database: self.database.clone(),
            measurement: LEADERBOARD_MEASUREMENT.to_string(),
            since: Some(
                now - Duration::days(BASELINE_WINDOW_DAYS)
                    - Duration::minutes(BASELINE_SLACK_MINUTES),
            ),
        };
        let points = match with_timeout(self.timeout, self.store.query_points(&query)).await {
            Ok(points) => points,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read last week's leaderboard");
                return Baseline::new();
            }
        };

        let mut baseline = Baseline::new();
        for point in points.into_iter().filter(|p| p.time <= now) {
            if let Some(url) = point.tags.get("url") {
                let score = point.tags.get("score").and_then(|s| s.parse::<i64>().ok());
                baseline.insert(url.clone(), score);
            }
        }
        baseline
    }
}
