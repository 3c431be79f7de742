//! Turns raw time-series samples into per-URL scores and leaderboards.
//!
//! [`fetcher::SeriesFetcher`] reads every catalog metric from the store,
//! [`aggregate::aggregate`] folds the per-metric results into one
//! [`UrlRow`](webscore_common::types::UrlRow) per URL, and
//! [`leaderboard::rank`] orders them.

pub mod aggregate;
pub mod error;
pub mod fetcher;
pub mod leaderboard;


use std::collections::BTreeMap;
use webscore_common::types::MetricSample;

/// URL → sample for one metric.
pub type MetricResults = BTreeMap<String, MetricSample>;

/// Fetch output for one catalog entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricResult {
    pub metric: String,
    pub samples: MetricResults,
}
