use crate::bootstrap::{connect_with_retry, ensure_database, RetryPolicy};
use crate::engine::{aggregate_samples, SqliteTimeSeriesStore};
use crate::snapshot::SnapshotStore;
use crate::subscribers::SubscriberRegistry;
use crate::{
    Aggregate, Fill, Point, PointQuery, SeriesQuery, SeriesRow, StorageError, StoredPoint,
    TimeSeriesStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use webscore_common::types::{RankEntry, RankedList};

fn setup() -> (TempDir, Arc<SqliteTimeSeriesStore>) {
    let dir = TempDir::new().unwrap();
    let store = SqliteTimeSeriesStore::new(dir.path()).unwrap();
    (dir, Arc::new(store))
}

fn sample(url: &str, field: &str, value: f64, at: DateTime<Utc>) -> Point {
    Point {
        measurement: "lighthouse".to_string(),
        tags: BTreeMap::from([("url".to_string(), url.to_string())]),
        fields: BTreeMap::from([(field.to_string(), value)]),
        timestamp: at,
    }
}

fn series_query(aggregate: Aggregate) -> SeriesQuery {
    SeriesQuery {
        database: "lighthouse".to_string(),
        measurement: "lighthouse".to_string(),
        field: "performance".to_string(),
        from: None,
        to: None,
        aggregate,
    }
}

#[tokio::test]
async fn latest_picks_most_recent_point_per_url() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.create_database("lighthouse").await.unwrap();
    store
        .write_points(
            "lighthouse",
            &[
                sample("b.example", "performance", 40.0, now - Duration::hours(5)),
                sample("a.example", "performance", 70.0, now - Duration::hours(3)),
                sample("a.example", "performance", 75.0, now - Duration::hours(1)),
                sample("a.example", "accessibility", 10.0, now),
            ],
        )
        .await
        .unwrap();

    let rows = store
        .query_series(&series_query(Aggregate::Latest))
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].url, "a.example");
    assert_eq!(rows[0].value, Some(75.0));
    assert_eq!(rows[1].url, "b.example");
    assert_eq!(rows[1].value, Some(40.0));
}

#[tokio::test]
async fn max_respects_upper_bound() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.create_database("lighthouse").await.unwrap();
    store
        .write_points(
            "lighthouse",
            &[
                sample("a.example", "performance", 80.0, now - Duration::days(20)),
                sample("a.example", "performance", 60.0, now - Duration::days(10)),
                sample("a.example", "performance", 99.0, now - Duration::days(2)),
            ],
        )
        .await
        .unwrap();

    let mut query = series_query(Aggregate::Max);
    query.to = Some(now - Duration::days(7));
    let rows = store.query_series(&query).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, Some(80.0));
    assert_eq!(
        rows[0].time.date_naive(),
        (now - Duration::days(20)).date_naive()
    );
}

#[tokio::test]
async fn mean_fills_empty_buckets() {
    let (_dir, store) = setup();
    let now = Utc::now();
    let start = now - Duration::days(4);
    store.create_database("lighthouse").await.unwrap();
    store
        .write_points(
            "lighthouse",
            &[
                sample("a.example", "performance", 10.0, start + Duration::hours(1)),
                sample("a.example", "performance", 20.0, start + Duration::hours(2)),
                sample("a.example", "performance", 50.0, start + Duration::days(3)),
            ],
        )
        .await
        .unwrap();

    let mut query = series_query(Aggregate::Mean {
        start,
        width: Duration::days(1),
        buckets: 4,
        fill: Fill::Empty,
    });
    query.from = Some(start);
    let rows = store.query_series(&query).await.unwrap();

    let values: Vec<Option<f64>> = rows.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![Some(15.0), None, None, Some(50.0)]);
}

#[test]
fn mean_without_fill_skips_empty_buckets_and_clamps_tail() {
    let start = DateTime::from_timestamp_millis(0).unwrap();
    let day = Duration::days(1).num_milliseconds();
    let samples = vec![
        (0, "a".to_string(), 4.0),
        (3 * day, "a".to_string(), 8.0),
        (2 * day, "b".to_string(), 1.0),
    ];
    let rows = aggregate_samples(
        &samples,
        &Aggregate::Mean {
            start,
            width: Duration::days(1),
            buckets: 3,
            fill: Fill::None,
        },
    );

    assert_eq!(rows.len(), 3);
    assert_eq!((rows[0].url.as_str(), rows[0].value), ("a", Some(4.0)));
    // a point on the end boundary folds into the last bucket
    assert_eq!((rows[1].url.as_str(), rows[1].value), ("a", Some(8.0)));
    assert_eq!((rows[2].url.as_str(), rows[2].value), ("b", Some(1.0)));
}

#[tokio::test]
async fn write_to_missing_database_is_rejected() {
    let (_dir, store) = setup();
    let err = store
        .write_points("nope", &[sample("a", "performance", 1.0, Utc::now())])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::UnknownDatabase(_)));
}

#[tokio::test]
async fn ensure_database_creates_once() {
    let (_dir, store) = setup();
    ensure_database(store.as_ref(), "leaderboard").await.unwrap();
    ensure_database(store.as_ref(), "leaderboard").await.unwrap();
    assert_eq!(store.database_names().await.unwrap(), vec!["leaderboard"]);
}

#[tokio::test]
async fn connect_with_retry_gives_up_after_budget() {
    let (_dir, store) = setup();
    let policy = RetryPolicy {
        attempts: 3,
        interval: std::time::Duration::from_millis(1),
        ..RetryPolicy::default()
    };
    let err = connect_with_retry(store.as_ref(), "bad/name", policy)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unavailable { attempts: 3, .. }));
}

#[tokio::test]
async fn snapshot_round_trip_keeps_last_score_per_url() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.create_database("leaderboard").await.unwrap();
    let snapshots = SnapshotStore::new(store.clone(), "leaderboard");

    let old = RankedList::new(vec![RankEntry {
        url: "a.example".into(),
        score: 10,
    }]);
    let newer = RankedList::new(vec![
        RankEntry {
            url: "a.example".into(),
            score: 30,
        },
        RankEntry {
            url: "b.example".into(),
            score: -1,
        },
    ]);
    snapshots.persist(&old, now - Duration::days(5)).await.unwrap();
    let written = snapshots.persist(&newer, now - Duration::days(2)).await.unwrap();
    assert_eq!(written, 2);

    let baseline = snapshots.fetch_last_week(now).await;
    assert_eq!(baseline.get("a.example"), Some(&Some(30)));
    assert_eq!(baseline.get("b.example"), Some(&Some(-1)));
}

#[tokio::test]
async fn snapshot_outside_week_is_ignored() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.create_database("leaderboard").await.unwrap();
    let snapshots = SnapshotStore::new(store.clone(), "leaderboard");
    let list = RankedList::new(vec![RankEntry {
        url: "a.example".into(),
        score: 10,
    }]);
    snapshots.persist(&list, now - Duration::days(8)).await.unwrap();

    assert!(snapshots.fetch_last_week(now).await.is_empty());
}

#[tokio::test]
async fn snapshot_one_interval_back_is_found_when_run_starts_late() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.create_database("leaderboard").await.unwrap();
    let snapshots = SnapshotStore::new(store.clone(), "leaderboard");
    let list = RankedList::new(vec![RankEntry {
        url: "a.example".into(),
        score: 10,
    }]);
    let previous_run = now - Duration::days(7) - Duration::milliseconds(1);
    snapshots.persist(&list, previous_run).await.unwrap();

    assert_eq!(snapshots.fetch_last_week(now).await.get("a.example"), Some(&Some(10)));
}

#[tokio::test]
async fn snapshot_read_failure_is_empty_baseline() {
    let (_dir, store) = setup();
    let snapshots = SnapshotStore::new(store, "leaderboard");
    assert!(snapshots.fetch_last_week(Utc::now()).await.is_empty());
}

#[tokio::test]
async fn snapshot_persist_failure_is_returned() {
    let (_dir, store) = setup();
    let snapshots = SnapshotStore::new(store, "leaderboard");
    let list = RankedList::new(vec![RankEntry {
        url: "a.example".into(),
        score: 1,
    }]);
    assert!(snapshots.persist(&list, Utc::now()).await.is_err());
}

#[tokio::test]
async fn subscriptions_last_write_wins() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.create_database("leaderboard").await.unwrap();
    let registry = SubscriberRegistry::new(store.clone(), "leaderboard");

    registry
        .update_subscription("a.example", "owner@a.example", true, now - Duration::days(3))
        .await
        .unwrap();
    registry
        .update_subscription("a.example", "owner@a.example", false, now - Duration::days(1))
        .await
        .unwrap();
    registry
        .update_subscription("a.example", "dev@a.example", true, now)
        .await
        .unwrap();

    let subscribers = registry.load().await;
    let emails = &subscribers["a.example"];
    assert_eq!(emails.get("owner@a.example"), Some(&false));
    assert_eq!(emails.get("dev@a.example"), Some(&true));
}

#[tokio::test]
async fn point_query_since_filters_and_orders() {
    let (_dir, store) = setup();
    let now = Utc::now();
    store.create_database("lighthouse").await.unwrap();
    store
        .write_points(
            "lighthouse",
            &[
                sample("b", "performance", 2.0, now - Duration::hours(1)),
                sample("a", "performance", 1.0, now - Duration::hours(2)),
                sample("c", "performance", 3.0, now - Duration::days(3)),
            ],
        )
        .await
        .unwrap();

    let points = store
        .query_points(&PointQuery {
            database: "lighthouse".into(),
            measurement: "lighthouse".into(),
            since: Some(now - Duration::days(1)),
        })
        .await
        .unwrap();

    let urls: Vec<&str> = points.iter().map(|p| p.tags["url"].as_str()).collect();
    assert_eq!(urls, vec!["a", "b"]);
    assert_eq!(points[1].fields["performance"], 2.0);
}

/// Store whose every call hangs.
struct HangingStore;

impl HangingStore {
    async fn hang() {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    }
}

#[async_trait]
impl TimeSeriesStore for HangingStore {
    async fn query_series(&self, _query: &SeriesQuery) -> crate::Result<Vec<SeriesRow>> {
        Self::hang().await;
        Ok(Vec::new())
    }

    async fn query_points(&self, _query: &PointQuery) -> crate::Result<Vec<StoredPoint>> {
        Self::hang().await;
        Ok(Vec::new())
    }

    async fn write_points(&self, _database: &str, _points: &[Point]) -> crate::Result<()> {
        Self::hang().await;
        Ok(())
    }

    async fn database_names(&self) -> crate::Result<Vec<String>> {
        Self::hang().await;
        Ok(Vec::new())
    }

    async fn create_database(&self, _name: &str) -> crate::Result<()> {
        Self::hang().await;
        Ok(())
    }
}

#[tokio::test]
async fn hung_store_calls_time_out() {
    let limit = std::time::Duration::from_millis(20);
    let store: Arc<dyn TimeSeriesStore> = Arc::new(HangingStore);
    let list = RankedList::new(vec![RankEntry {
        url: "a.example".into(),
        score: 1,
    }]);

    let snapshots = SnapshotStore::new(store.clone(), "leaderboard").with_timeout(limit);
    let err = snapshots.persist(&list, Utc::now()).await.unwrap_err();
    assert!(matches!(err, StorageError::Timeout(_)));
    assert!(snapshots.fetch_last_week(Utc::now()).await.is_empty());

    let registry = SubscriberRegistry::new(store.clone(), "leaderboard").with_timeout(limit);
    assert!(registry.load().await.is_empty());
    assert!(registry
        .update_subscription("a.example", "owner@a.example", true, Utc::now())
        .await
        .is_err());

    let policy = RetryPolicy {
        attempts: 2,
        interval: std::time::Duration::from_millis(1),
        timeout: limit,
    };
    let err = connect_with_retry(store.as_ref(), "leaderboard", policy)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unavailable { attempts: 2, .. }));
}
