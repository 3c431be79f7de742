use crate::window::ConsistencyWindow;
use webscore_common::types::RankedList;

/// A leaderboard region whose membership must hold on every day of the
/// window before an event about it is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Outside the first `k` entries: `score <= list[k].score`.
    TopK(usize),
    /// Outside the last `k` entries: `score > list[len - k].score`.
    BottomK(usize),
    /// Below the median entry: `score < list[round(len / 2)].score`.
    Median,
}

impl Category {
    /// Evaluates the category predicate for `url` on one day.
    ///
    /// Returns `None` when the URL or the anchor entry is missing.
    pub fn evaluate(self, list: &RankedList, url: &str) -> Option<bool> {
        let score = list.score_of(url)?;
        match self {
            Category::TopK(k) => list.get(k).map(|anchor| score <= anchor.score),
            Category::BottomK(k) => list
                .len()
                .checked_sub(k)
                .and_then(|i| list.get(i))
                .map(|anchor| score > anchor.score),
            Category::Median => list
                .get(median_index(list.len()))
                .map(|anchor| score < anchor.score),
        }
    }

    /// Whether the predicate gave the same answer on every day of `window`.
    ///
    /// A missing URL or anchor on any day makes the result inconsistent.
    pub fn is_consistent(self, window: &ConsistencyWindow, url: &str) -> bool {
        let mut verdict = None;
        for day in window.days() {
            let Some(current) = self.evaluate(day, url) else {
                return false;
            };
            if verdict.is_some_and(|previous| previous != current) {
                return false;
            }
            verdict = Some(current);
        }
        true
    }
}

/// `len / 2` rounded half up.
pub fn median_index(len: usize) -> usize {
    (len + 1) / 2
}
