//! Time-series storage layer for metric samples, leaderboard snapshots and
//! subscriptions.
//!
//! Everything above this crate talks to the store through the
//! [`TimeSeriesStore`] trait. The bundled implementation
//! ([`engine::SqliteTimeSeriesStore`]) keeps one SQLite database file per
//! logical database. Calls are serialized on one connection per database.

pub mod bootstrap;
pub mod database;
pub mod engine;
pub mod error;
pub mod snapshot;
pub mod subscribers;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::future::Future;

pub use error::{Result, StorageError};

/// Time limit applied to snapshot, subscription and bootstrap calls unless
/// configured otherwise.
pub const DEFAULT_CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Awaits `call`, failing with [`StorageError::Timeout`] once `limit` passes.
pub async fn with_timeout<T>(
    limit: std::time::Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StorageError::Timeout(limit))?
}

/// A single point to write: one measurement, tagged (at least by `url`),
/// with numeric fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

/// A point read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub time: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
}

/// Raw scan of a measurement, oldest point first.
#[derive(Debug, Clone)]
pub struct PointQuery {
    pub database: String,
    pub measurement: String,
    pub since: Option<DateTime<Utc>>,
}

/// What to do with a bucket that received no samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Omit the bucket.
    None,
    /// Emit the bucket with no value.
    Empty,
}

/// Per-URL reduction applied to the points selected by a [`SeriesQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// The most recent point.
    Latest,
    /// The largest value, timestamped with the point that carried it.
    Max,
    /// Mean per fixed-width bucket. Bucket `i` covers
    /// `[start + i * width, start + (i + 1) * width)`; points past the last
    /// bucket fold into it.
    Mean {
        start: DateTime<Utc>,
        width: Duration,
        buckets: usize,
        fill: Fill,
    },
}

/// A query over one field of one measurement, grouped by the `url` tag.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use webscore_storage::{Aggregate, SeriesQuery};
///
/// let now = Utc::now();
/// let query = SeriesQuery {
///     database: "lighthouse".into(),
///     measurement: "lighthouse".into(),
///     field: "performance".into(),
///     from: Some(now - Duration::days(1)),
///     to: None,
///     aggregate: Aggregate::Latest,
/// };
/// assert_eq!(query.field, "performance");
/// ```
#[derive(Debug, Clone)]
pub struct SeriesQuery {
    pub database: String,
    pub measurement: String,
    pub field: String,
    /// Inclusive lower bound; `None` is unbounded.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound; `None` is unbounded.
    pub to: Option<DateTime<Utc>>,
    pub aggregate: Aggregate,
}

/// One result row of a [`SeriesQuery`]. Rows are ordered by url, then time.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub url: String,
    pub time: DateTime<Utc>,
    /// `None` only for buckets emitted with [`Fill::Empty`].
    pub value: Option<f64>,
}

/// Read/write interface to the time-series store.
///
/// Implementations must tolerate concurrent reads: the series fetcher
/// issues all of its queries at once.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Runs an aggregated query grouped by `url`.
    async fn query_series(&self, query: &SeriesQuery) -> Result<Vec<SeriesRow>>;

    /// Returns raw points of a measurement, oldest first.
    async fn query_points(&self, query: &PointQuery) -> Result<Vec<StoredPoint>>;

    /// Writes all points or none.
    ///
    /// # Errors
    ///
    /// Fails if the database does not exist or the write is rejected.
    async fn write_points(&self, database: &str, points: &[Point]) -> Result<()>;

    /// Names of existing databases.
    async fn database_names(&self) -> Result<Vec<String>>;

    /// Creates a database. Creating an existing database is a no-op.
    async fn create_database(&self, name: &str) -> Result<()>;
}
