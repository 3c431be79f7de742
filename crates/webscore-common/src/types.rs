use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Score reserved for "unknown". Exclusive leaderboards drop it.
pub const UNKNOWN_SCORE: i64 = -1;

/// Multiplier applied to checklist counters before they are displayed.
pub const CHECKLIST_WEIGHT: u32 = 5;

/// One entry of the metric catalog.
///
/// # Examples
///
/// ```
/// use webscore_common::types::MetricSpec;
///
/// let spec: MetricSpec = serde_json::from_str(
///     r#"{"name":"performance","measurement":"lighthouse","field":"performance","database":"lighthouse","thresholds":[50,90]}"#,
/// ).unwrap();
/// assert_eq!(spec.name, "performance");
/// assert!(!spec.important);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub measurement: String,
    pub field: String,
    pub database: String,
    /// `[red, yellow]`: below red fails, below yellow warns.
    pub thresholds: [f64; 2],
    #[serde(default)]
    pub important: bool,
}

/// A single time bucket of a mean series. `None` marks a bucket with no samples.
pub type Bucket = Option<f64>;

/// Whether a bucket carries a real measurement.
///
/// Negative means are treated like empty buckets, matching the store's
/// historical `-1` fill value.
pub fn has_data(bucket: &Bucket) -> bool {
    matches!(bucket, Some(v) if *v >= 0.0)
}

/// Rounds half up (towards positive infinity) to an integer.
///
/// Returns `None` for NaN and infinities.
///
/// # Examples
///
/// ```
/// use webscore_common::types::round_half_up;
///
/// assert_eq!(round_half_up(2.5), Some(3));
/// assert_eq!(round_half_up(-2.5), Some(-2));
/// assert_eq!(round_half_up(f64::NAN), None);
/// ```
pub fn round_half_up(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    Some((value + 0.5).floor() as i64)
}

/// Raw per-(metric, URL) data as returned by the series fetcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSample {
    pub value: Option<f64>,
    pub max: Option<f64>,
    pub max_time: Option<NaiveDate>,
    /// Daily means over the trailing 30 days, oldest first.
    pub month_series: Vec<Bucket>,
    /// Weekly means over the trailing year, oldest first.
    pub year_series: Vec<Bucket>,
}

/// Per-metric detail stored on a [`UrlRow`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDetail {
    pub value: Option<i64>,
    pub max: Option<i64>,
    pub max_time: Option<NaiveDate>,
    /// Daily means with empty buckets removed.
    pub month_series: Vec<f64>,
    /// Weekly means with empty buckets removed.
    pub year_series: Vec<f64>,
    /// Daily buckets aligned by day, kept for window reconstruction.
    #[serde(skip)]
    pub month_buckets: Vec<Bucket>,
}

/// Aggregated view of one URL across every metric of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlRow {
    pub url: String,
    pub metrics: BTreeMap<String, MetricDetail>,
    /// Sum of the rounded metric values; `None` when any value was not a finite number.
    pub score: Option<i64>,
    pub checks: u32,
    pub median: Option<i64>,
    pub check_list_month: Vec<u32>,
    pub check_list_year: Vec<u32>,
}

impl UrlRow {
    /// Returns the same row keyed by `url`.
    pub fn rekeyed(self, url: String) -> Self {
        Self { url, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub url: String,
    pub score: i64,
}

/// Score-descending leaderboard with unique URLs.
///
/// The order is taken as given; building and sorting is the leaderboard
/// builder's job. Later duplicates of an URL are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedList {
    entries: Vec<RankEntry>,
    index: HashMap<String, usize>,
}

impl RankedList {
    pub fn new(entries: Vec<RankEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        let mut unique = Vec::with_capacity(entries.len());
        for entry in entries {
            if index.contains_key(&entry.url) {
                continue;
            }
            index.insert(entry.url.clone(), unique.len());
            unique.push(entry);
        }
        Self {
            entries: unique,
            index,
        }
    }

    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, rank: usize) -> Option<&RankEntry> {
        self.entries.get(rank)
    }

    pub fn first(&self) -> Option<&RankEntry> {
        self.entries.first()
    }

    pub fn score_of(&self, url: &str) -> Option<i64> {
        self.index.get(url).map(|&i| self.entries[i].score)
    }

    pub fn position(&self, url: &str) -> Option<usize> {
        self.index.get(url).copied()
    }

    /// The first `k` entries (fewer if the list is shorter).
    pub fn top(&self, k: usize) -> &[RankEntry] {
        &self.entries[..k.min(self.entries.len())]
    }

    /// The last `k` entries (fewer if the list is shorter).
    pub fn bottom(&self, k: usize) -> &[RankEntry] {
        &self.entries[self.entries.len().saturating_sub(k)..]
    }

    /// Entries in `[start, end)`, empty when the range is inverted or out of bounds.
    pub fn slice(&self, start: usize, end: usize) -> &[RankEntry] {
        let end = end.min(self.entries.len());
        if start >= end {
            return &[];
        }
        &self.entries[start..end]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankEntry> {
        self.entries.iter()
    }
}

/// Kind of ranking change a subscriber is told about.
///
/// # Examples
///
/// ```
/// use webscore_common::types::EventKind;
///
/// assert_eq!(EventKind::EnteredTopK.to_string(), "entered_top_k");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FirstPlace,
    EnteredTopK,
    ExitedTopK,
    EnteredBottomK,
    AboveMedian,
    BelowMedian,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::FirstPlace => write!(f, "first_place"),
            EventKind::EnteredTopK => write!(f, "entered_top_k"),
            EventKind::ExitedTopK => write!(f, "exited_top_k"),
            EventKind::EnteredBottomK => write!(f, "entered_bottom_k"),
            EventKind::AboveMedian => write!(f, "above_median"),
            EventKind::BelowMedian => write!(f, "below_median"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub url: String,
    pub score: i64,
    /// Size of the band the event refers to.
    pub band_size: usize,
    /// Current top of the leaderboard at the time the event was raised.
    pub leaderboard: Vec<RankEntry>,
}

/// URL → email → active.
pub type SubscriberMap = BTreeMap<String, BTreeMap<String, bool>>;

/// Emails subscribed to `url` whose subscription is active.
pub fn active_subscribers<'a>(subscribers: &'a SubscriberMap, url: &str) -> Vec<&'a str> {
    subscribers
        .get(url)
        .map(|emails| {
            emails
                .iter()
                .filter(|(_, active)| **active)
                .map(|(email, _)| email.as_str())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, score: i64) -> RankEntry {
        RankEntry {
            url: url.to_string(),
            score,
        }
    }

    #[test]
    fn ranked_list_drops_duplicate_urls() {
        let list = RankedList::new(vec![entry("a", 10), entry("b", 8), entry("a", 5)]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.score_of("a"), Some(10));
        assert_eq!(list.position("b"), Some(1));
    }

    #[test]
    fn ranked_list_windows_clamp_to_length() {
        let list = RankedList::new(vec![entry("a", 3), entry("b", 2), entry("c", 1)]);
        assert_eq!(list.top(5).len(), 3);
        assert_eq!(list.bottom(2)[0].url, "b");
        assert!(list.slice(2, 1).is_empty());
        assert!(list.slice(4, 9).is_empty());
        assert_eq!(list.slice(1, 9).len(), 2);
    }

    #[test]
    fn has_data_rejects_empty_and_negative_buckets() {
        assert!(has_data(&Some(0.0)));
        assert!(has_data(&Some(42.5)));
        assert!(!has_data(&None));
        assert!(!has_data(&Some(-1.0)));
    }

    #[test]
    fn active_subscribers_skips_inactive() {
        let mut subscribers = SubscriberMap::new();
        let emails = subscribers.entry("site".to_string()).or_default();
        emails.insert("a@example.org".to_string(), true);
        emails.insert("b@example.org".to_string(), false);

        assert_eq!(active_subscribers(&subscribers, "site"), vec!["a@example.org"]);
        assert!(active_subscribers(&subscribers, "other").is_empty());
    }
}
