use std::collections::{HashMap, HashSet};
use webscore_common::types::{has_data, RankedList, UrlRow};
use webscore_score::leaderboard::{rank, RankMode};

/// Number of past days checked besides today.
pub const DEFAULT_CONSISTENCY_DAYS: usize = 3;

/// Index of the daily bucket that stands for "today" in the 30-day series.
pub const DEFAULT_RECONSTRUCTION_ANCHOR: usize = 14;

/// Leaderboards by day offset, `0` being today.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyWindow {
    days: Vec<RankedList>,
}

impl ConsistencyWindow {
    pub fn new(today: RankedList, history: Vec<RankedList>) -> Self {
        let mut days = Vec::with_capacity(history.len() + 1);
        days.push(today);
        days.extend(history);
        Self { days }
    }

    /// Builds the window from today's leaderboard and the rows it was ranked
    /// from, reconstructing `days` previous rankings.
    pub fn from_rows(today: RankedList, rows: &[UrlRow], days: usize, anchor: usize) -> Self {
        Self::new(today, reconstruct(rows, days, anchor))
    }

    pub fn days(&self) -> &[RankedList] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Rankings for offsets `1..=days`, derived from the daily buckets already on
/// `rows`.
///
/// For offset `i` each URL's score is the sum over its metrics of the bucket
/// at `anchor - i`, truncated to an integer. Buckets without data, and
/// indexes outside a series, do not contribute; a URL with no contributing
/// metric, or whose total overflows, is absent from that day. Only the first
/// row of a URL is used.
pub fn reconstruct(rows: &[UrlRow], days: usize, anchor: usize) -> Vec<RankedList> {
    (1..=days)
        .map(|offset| {
            let Some(index) = anchor.checked_sub(offset) else {
                return RankedList::default();
            };
            let mut totals: Vec<(&str, Option<i64>)> = Vec::new();
            let mut slots: HashMap<&str, usize> = HashMap::new();
            let mut seen: HashSet<&str> = HashSet::new();

            for row in rows {
                if !seen.insert(row.url.as_str()) {
                    continue;
                }
                for detail in row.metrics.values() {
                    let Some(value) = detail.month_buckets.get(index).copied().flatten() else {
                        continue;
                    };
                    if !has_data(&Some(value)) {
                        continue;
                    }
                    let slot = *slots.entry(row.url.as_str()).or_insert_with(|| {
                        totals.push((row.url.as_str(), Some(0)));
                        totals.len() - 1
                    });
                    let total = &mut totals[slot].1;
                    *total = total.and_then(|t| t.checked_add(value.trunc() as i64));
                }
            }

            rank(totals, RankMode::Exclusive)
        })
        .collect()
}
