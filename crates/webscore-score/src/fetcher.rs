use crate::error::FetchError;
use crate::{MetricResult, MetricResults};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use webscore_common::types::{Bucket, MetricSample, MetricSpec};
use webscore_storage::{Aggregate, Fill, SeriesQuery, SeriesRow, TimeSeriesStore};

/// The latest value must be at most this old.
pub const LATEST_WINDOW_DAYS: i64 = 1;
/// Samples younger than this are left out of the historic max.
pub const MAX_GRACE_DAYS: i64 = 7;
pub const MONTH_BUCKETS: usize = 30;
pub const YEAR_DAYS: i64 = 365;
pub const YEAR_BUCKET_DAYS: i64 = 7;

/// Reads the four per-metric series from the store.
#[derive(Clone)]
pub struct SeriesFetcher {
    store: Arc<dyn TimeSeriesStore>,
    query_timeout: std::time::Duration,
}

impl SeriesFetcher {
    pub fn new(store: Arc<dyn TimeSeriesStore>, query_timeout: std::time::Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }

    /// The latest, historic-max, monthly and yearly queries for `spec`,
    /// in that order.
    pub fn queries(spec: &MetricSpec, now: DateTime<Utc>) -> [SeriesQuery; 4] {
        let base = |from, to, aggregate| SeriesQuery {
            database: spec.database.clone(),
            measurement: spec.measurement.clone(),
            field: spec.field.clone(),
            from,
            to,
            aggregate,
        };
        let month_start = now - Duration::days(MONTH_BUCKETS as i64);
        let year_start = now - Duration::days(YEAR_DAYS);

        [
            base(
                Some(now - Duration::days(LATEST_WINDOW_DAYS)),
                Some(now),
                Aggregate::Latest,
            ),
            base(None, Some(now - Duration::days(MAX_GRACE_DAYS)), Aggregate::Max),
            base(
                Some(month_start),
                Some(now),
                Aggregate::Mean {
                    start: month_start,
                    width: Duration::days(1),
                    buckets: MONTH_BUCKETS,
                    fill: Fill::Empty,
                },
            ),
            base(
                Some(year_start),
                Some(now),
                Aggregate::Mean {
                    start: year_start,
                    width: Duration::days(YEAR_BUCKET_DAYS),
                    buckets: (YEAR_DAYS / YEAR_BUCKET_DAYS) as usize,
                    fill: Fill::Empty,
                },
            ),
        ]
    }

    async fn timed(&self, query: &SeriesQuery) -> Result<Vec<SeriesRow>, FetchError> {
        tokio::time::timeout(self.query_timeout, self.store.query_series(query))
            .await
            .map_err(|_| FetchError::Timeout(self.query_timeout))?
            .map_err(FetchError::from)
    }

    /// Fetches one metric. Any failing query empties the whole result.
    pub async fn fetch(&self, spec: &MetricSpec, now: DateTime<Utc>) -> MetricResults {
        let [latest, max, month, year] = Self::queries(spec, now);
        let fetched = tokio::try_join!(
            self.timed(&latest),
            self.timed(&max),
            self.timed(&month),
            self.timed(&year),
        );

        match fetched {
            Ok((latest, max, month, year)) => normalize(latest, max, month, year),
            Err(e) => {
                tracing::error!(
                    metric = %spec.name,
                    database = %spec.database,
                    error = %e,
                    "Metric query failed, continuing without it"
                );
                MetricResults::new()
            }
        }
    }

    /// Fetches every catalog metric concurrently. Results keep catalog order.
    pub async fn fetch_all(&self, catalog: &[MetricSpec], now: DateTime<Utc>) -> Vec<MetricResult> {
        let handles: Vec<_> = catalog
            .iter()
            .cloned()
            .map(|spec| {
                let fetcher = self.clone();
                tokio::spawn(async move {
                    let samples = fetcher.fetch(&spec, now).await;
                    MetricResult {
                        metric: spec.name,
                        samples,
                    }
                })
            })
            .collect();

        let mut results = Vec::with_capacity(catalog.len());
        for (spec, handle) in catalog.iter().zip(handles) {
            match handle.await {
                Ok(result) => {
                    tracing::debug!(metric = %result.metric, urls = result.samples.len(), "Metric fetched");
                    results.push(result);
                }
                Err(e) => {
                    tracing::error!(metric = %spec.name, error = %e, "Metric fetch task failed");
                    results.push(MetricResult {
                        metric: spec.name.clone(),
                        samples: MetricResults::new(),
                    });
                }
            }
        }
        results
    }
}

fn group_series(rows: Vec<SeriesRow>) -> HashMap<String, Vec<Bucket>> {
    let mut series: HashMap<String, Vec<Bucket>> = HashMap::new();
    for row in rows {
        series.entry(row.url).or_default().push(row.value);
    }
    series
}

/// Joins the four result sets on url. Only URLs with a latest value produce
/// a sample.
fn normalize(
    latest: Vec<SeriesRow>,
    max: Vec<SeriesRow>,
    month: Vec<SeriesRow>,
    year: Vec<SeriesRow>,
) -> MetricResults {
    let max: HashMap<String, (Option<f64>, NaiveDate)> = max
        .into_iter()
        .map(|row| (row.url, (row.value, row.time.date_naive())))
        .collect();
    let mut month = group_series(month);
    let mut year = group_series(year);

    let mut samples = BTreeMap::new();
    for row in latest {
        let (max_value, max_time) = match max.get(&row.url) {
            Some((value, date)) => (*value, Some(*date)),
            None => (None, None),
        };
        let sample = MetricSample {
            value: row.value,
            max: max_value,
            max_time,
            month_series: month.remove(&row.url).unwrap_or_default(),
            year_series: year.remove(&row.url).unwrap_or_default(),
        };
        samples.insert(row.url, sample);
    }
    samples
}
