use crate::database::DatabaseManager;
use crate::error::{Result, StorageError};
use crate::{
    Aggregate, Fill, Point, PointQuery, SeriesQuery, SeriesRow, StoredPoint, TimeSeriesStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// SQLite-backed [`TimeSeriesStore`].
///
/// Calls run on tokio's blocking pool; the connection cache serialises
/// access per process.
#[derive(Clone)]
pub struct SqliteTimeSeriesStore {
    databases: Arc<DatabaseManager>,
}

impl SqliteTimeSeriesStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            databases: Arc::new(DatabaseManager::new(data_dir)?),
        })
    }

    async fn blocking<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&DatabaseManager) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let databases = self.databases.clone();
        tokio::task::spawn_blocking(move || f(&databases))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// A scanned row: timestamp (ms), url, tags JSON, fields JSON.
type RawRow = (i64, String, String, String);

fn scan(
    databases: &DatabaseManager,
    database: &str,
    measurement: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    order_by_url: bool,
) -> Result<Vec<RawRow>> {
    let from_ms = from.map_or(i64::MIN, |t| t.timestamp_millis());
    let to_ms = to.map_or(i64::MAX, |t| t.timestamp_millis());
    let sql = if order_by_url {
        "SELECT timestamp, url, tags, fields FROM points
         WHERE measurement = ?1 AND timestamp >= ?2 AND timestamp <= ?3
         ORDER BY url ASC, timestamp ASC, id ASC"
    } else {
        "SELECT timestamp, url, tags, fields FROM points
         WHERE measurement = ?1 AND timestamp >= ?2 AND timestamp <= ?3
         ORDER BY timestamp ASC, id ASC"
    };

    databases.with_database(database, |conn| {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(rusqlite::params![measurement, from_ms, to_ms], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

fn decode_fields(fields_json: &str) -> Result<BTreeMap<String, f64>> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(fields_json)?;
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| v.as_f64().map(|v| (k, v)))
        .collect())
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Reduces `(timestamp_ms, url, value)` samples, ordered by url then time,
/// according to `aggregate`.
pub(crate) fn aggregate_samples(
    samples: &[(i64, String, f64)],
    aggregate: &Aggregate,
) -> Vec<SeriesRow> {
    let mut out = Vec::new();
    for group in samples.chunk_by(|a, b| a.1 == b.1) {
        let url = &group[0].1;
        match aggregate {
            Aggregate::Latest => {
                if let Some((ts, _, value)) = group.last() {
                    out.push(SeriesRow {
                        url: url.clone(),
                        time: from_millis(*ts),
                        value: Some(*value),
                    });
                }
            }
            Aggregate::Max => {
                let best = group.iter().fold(None::<&(i64, String, f64)>, |best, s| {
                    match best {
                        Some(b) if b.2 >= s.2 => Some(b),
                        _ => Some(s),
                    }
                });
                if let Some((ts, _, value)) = best {
                    out.push(SeriesRow {
                        url: url.clone(),
                        time: from_millis(*ts),
                        value: Some(*value),
                    });
                }
            }
            Aggregate::Mean {
                start,
                width,
                buckets,
                fill,
            } => {
                let width_ms = width.num_milliseconds().max(1);
                let start_ms = start.timestamp_millis();
                let mut sums = vec![(0.0f64, 0u32); *buckets];
                for (ts, _, value) in group {
                    if *ts < start_ms || *buckets == 0 {
                        continue;
                    }
                    let idx = (((ts - start_ms) / width_ms) as usize).min(buckets - 1);
                    sums[idx].0 += value;
                    sums[idx].1 += 1;
                }
                for (i, (sum, count)) in sums.into_iter().enumerate() {
                    let value = (count > 0).then(|| sum / f64::from(count));
                    if value.is_none() && *fill == Fill::None {
                        continue;
                    }
                    out.push(SeriesRow {
                        url: url.clone(),
                        time: from_millis(start_ms + width_ms * i as i64),
                        value,
                    });
                }
            }
        }
    }
    out
}

#[async_trait]
impl TimeSeriesStore for SqliteTimeSeriesStore {
    async fn query_series(&self, query: &SeriesQuery) -> Result<Vec<SeriesRow>> {
        let query = query.clone();
        self.blocking(move |databases| {
            let rows = scan(
                databases,
                &query.database,
                &query.measurement,
                query.from,
                query.to,
                true,
            )?;
            let mut samples = Vec::with_capacity(rows.len());
            for (ts, url, _tags, fields) in rows {
                if let Some(value) = decode_fields(&fields)?.get(&query.field) {
                    samples.push((ts, url, *value));
                }
            }
            Ok(aggregate_samples(&samples, &query.aggregate))
        })
        .await
    }

    async fn query_points(&self, query: &PointQuery) -> Result<Vec<StoredPoint>> {
        let query = query.clone();
        self.blocking(move |databases| {
            let rows = scan(
                databases,
                &query.database,
                &query.measurement,
                query.since,
                None,
                false,
            )?;
            rows.into_iter()
                .map(|(ts, _url, tags, fields)| -> Result<StoredPoint> {
                    Ok(StoredPoint {
                        time: from_millis(ts),
                        tags: serde_json::from_str(&tags)?,
                        fields: decode_fields(&fields)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn write_points(&self, database: &str, points: &[Point]) -> Result<()> {
        let database = database.to_string();
        let points = points.to_vec();
        self.blocking(move |databases| {
            databases.with_database(&database, |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(
                        "INSERT INTO points (measurement, timestamp, url, tags, fields)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for point in &points {
                        let url = point.tags.get("url").map(String::as_str).unwrap_or("");
                        stmt.execute(rusqlite::params![
                            &point.measurement,
                            point.timestamp.timestamp_millis(),
                            url,
                            serde_json::to_string(&point.tags)?,
                            serde_json::to_string(&point.fields)?,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
        })
        .await
    }

    async fn database_names(&self) -> Result<Vec<String>> {
        self.blocking(|databases| databases.names()).await
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.blocking(move |databases| databases.create(&name)).await
    }
}
