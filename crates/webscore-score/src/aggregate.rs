use crate::MetricResult;
use std::collections::HashMap;
use webscore_common::types::{
    has_data, round_half_up, Bucket, MetricDetail, MetricSample, UrlRow, CHECKLIST_WEIGHT,
};

/// Folds every metric's results into one row per URL.
///
/// Rows appear in discovery order: catalog order first, then URL order
/// within a metric.
pub fn aggregate(results: &[MetricResult]) -> Vec<UrlRow> {
    results
        .iter()
        .flat_map(|result| {
            result
                .samples
                .iter()
                .map(move |(url, sample)| (result.metric.as_str(), url.as_str(), sample))
        })
        .fold(Accumulator::default(), |acc, (metric, url, sample)| {
            acc.add(metric, url, sample)
        })
        .finish()
}

#[derive(Default)]
struct Accumulator {
    rows: Vec<PartialRow>,
    index: HashMap<String, usize>,
}

impl Accumulator {
    fn add(mut self, metric: &str, url: &str, sample: &MetricSample) -> Self {
        let slot = match self.index.get(url) {
            Some(&i) => i,
            None => {
                self.index.insert(url.to_string(), self.rows.len());
                self.rows.push(PartialRow::new(url));
                self.rows.len() - 1
            }
        };
        self.rows[slot].add(metric, sample);
        self
    }

    fn finish(self) -> Vec<UrlRow> {
        self.rows.into_iter().map(PartialRow::finish).collect()
    }
}

struct PartialRow {
    row: UrlRow,
    values: Vec<i64>,
}

impl PartialRow {
    fn new(url: &str) -> Self {
        Self {
            row: UrlRow {
                url: url.to_string(),
                score: Some(0),
                ..UrlRow::default()
            },
            values: Vec::new(),
        }
    }

    fn add(&mut self, metric: &str, sample: &MetricSample) {
        let value = sample.value.and_then(round_half_up);
        self.row.score = match (self.row.score, value) {
            (Some(score), Some(v)) => score.checked_add(v),
            _ => None,
        };
        if let Some(v) = value {
            self.values.push(v);
        }
        self.row.checks += 1;
        fill_checklist(&mut self.row.check_list_month, &sample.month_series);
        fill_checklist(&mut self.row.check_list_year, &sample.year_series);

        self.row.metrics.insert(
            metric.to_string(),
            MetricDetail {
                value,
                max: sample.max.and_then(round_half_up),
                max_time: sample.max_time,
                month_series: with_data(&sample.month_series),
                year_series: with_data(&sample.year_series),
                month_buckets: sample.month_series.clone(),
            },
        );
    }

    fn finish(mut self) -> UrlRow {
        for count in self
            .row
            .check_list_month
            .iter_mut()
            .chain(self.row.check_list_year.iter_mut())
        {
            *count *= CHECKLIST_WEIGHT;
        }
        self.row.median = median(&self.values);
        self.row
    }
}

/// Adds one to each checklist slot whose bucket has data, growing the
/// checklist to the series length if needed.
fn fill_checklist(checklist: &mut Vec<u32>, series: &[Bucket]) {
    if checklist.len() < series.len() {
        checklist.resize(series.len(), 0);
    }
    for (count, bucket) in checklist.iter_mut().zip(series) {
        if has_data(bucket) {
            *count += 1;
        }
    }
}

fn with_data(series: &[Bucket]) -> Vec<f64> {
    series.iter().filter(|b| has_data(b)).flatten().copied().collect()
}

/// Median of `values`; the mean of the two middle values is rounded half up.
///
/// # Examples
///
/// ```
/// use webscore_score::aggregate::median;
///
/// assert_eq!(median(&[3, 1, 2]), Some(2));
/// assert_eq!(median(&[1, 2, 3, 4]), Some(3));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let sum = i128::from(sorted[mid - 1]) + i128::from(sorted[mid]) + 1;
        i64::try_from(sum.div_euclid(2)).ok()
    }
}
