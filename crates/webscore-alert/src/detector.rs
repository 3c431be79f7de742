use crate::consistency::{median_index, Category};
use crate::window::ConsistencyWindow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use webscore_common::types::{EventKind, NotificationEvent, RankEntry, RankedList};
use webscore_score::leaderboard::{rank, RankMode};

/// Size of the top and bottom bands.
pub const DEFAULT_BAND_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    pub top_k: usize,
    pub bottom_k: usize,
    /// Skip `EnteredTopK` for today's leader; it already gets `FirstPlace`.
    pub suppress_leader_entry: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_BAND_SIZE,
            bottom_k: DEFAULT_BAND_SIZE,
            suppress_leader_entry: false,
        }
    }
}

/// Compares today's leaderboard with last week's and keeps only the changes
/// that held across the whole consistency window.
pub struct EventDetector {
    config: DetectorConfig,
}

impl EventDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detects ranking events.
    ///
    /// `today` is the exclusive leaderboard, `baseline` the last recorded
    /// score per URL during the previous week. An empty baseline yields no
    /// events. Each `(kind, url)` pair is reported at most once.
    pub fn detect(
        &self,
        today: &RankedList,
        baseline: &BTreeMap<String, Option<i64>>,
        window: &ConsistencyWindow,
    ) -> Vec<NotificationEvent> {
        if baseline.is_empty() || today.is_empty() {
            return Vec::new();
        }
        let last_week = rank(
            baseline.iter().map(|(url, score)| (url.as_str(), *score)),
            RankMode::Exclusive,
        );
        if last_week.is_empty() {
            return Vec::new();
        }

        let mut events = Events::new(today, &self.config);
        self.first_place(today, &last_week, &mut events);
        self.top_band(today, &last_week, window, &mut events);
        self.bottom_band(today, &last_week, window, &mut events);
        self.median_bands(today, baseline, &last_week, window, &mut events);

        tracing::debug!(count = events.list.len(), "Detected ranking events");
        events.list
    }

    fn first_place(&self, today: &RankedList, last_week: &RankedList, events: &mut Events) {
        if let (Some(leader), Some(previous)) = (today.first(), last_week.first()) {
            if leader.url != previous.url {
                events.push(EventKind::FirstPlace, leader);
            }
        }
    }

    fn top_band(
        &self,
        today: &RankedList,
        last_week: &RankedList,
        window: &ConsistencyWindow,
        events: &mut Events,
    ) {
        let k = self.config.top_k;
        let category = Category::TopK(k);
        let previous: HashSet<&str> = last_week.top(k).iter().map(|e| e.url.as_str()).collect();
        let current: HashSet<&str> = today.top(k).iter().map(|e| e.url.as_str()).collect();

        for (position, entry) in today.top(k).iter().enumerate() {
            if previous.contains(entry.url.as_str()) {
                continue;
            }
            if position == 0 && self.config.suppress_leader_entry {
                continue;
            }
            if category.is_consistent(window, &entry.url) {
                events.push(EventKind::EnteredTopK, entry);
            }
        }

        for entry in last_week.top(k) {
            if current.contains(entry.url.as_str()) {
                continue;
            }
            if !category.is_consistent(window, &entry.url) {
                continue;
            }
            if let Some(score) = today.score_of(&entry.url) {
                events.push(
                    EventKind::ExitedTopK,
                    &RankEntry {
                        url: entry.url.clone(),
                        score,
                    },
                );
            }
        }
    }

    fn bottom_band(
        &self,
        today: &RankedList,
        last_week: &RankedList,
        window: &ConsistencyWindow,
        events: &mut Events,
    ) {
        let k = self.config.bottom_k;
        let category = Category::BottomK(k);
        let previous: HashSet<&str> = last_week
            .bottom(k)
            .iter()
            .map(|e| e.url.as_str())
            .collect();

        for entry in today.bottom(k).iter().rev() {
            if !previous.contains(entry.url.as_str()) && category.is_consistent(window, &entry.url)
            {
                events.push(EventKind::EnteredBottomK, entry);
            }
        }
    }

    /// URLs between the bands whose side of last week's median flipped.
    fn median_bands(
        &self,
        today: &RankedList,
        baseline: &BTreeMap<String, Option<i64>>,
        last_week: &RankedList,
        window: &ConsistencyWindow,
        events: &mut Events,
    ) {
        let Some(last_median) = last_week.get(median_index(last_week.len())) else {
            return;
        };
        let middle = median_index(today.len());
        let above = today.slice(self.config.top_k, middle);
        let below = today.slice(middle + 1, today.len().saturating_sub(self.config.bottom_k));

        let previous_score = |url: &str| baseline.get(url).copied().flatten();

        for entry in above {
            if previous_score(&entry.url).is_some_and(|s| s < last_median.score)
                && Category::Median.is_consistent(window, &entry.url)
            {
                events.push(EventKind::AboveMedian, entry);
            }
        }
        for entry in below {
            if previous_score(&entry.url).is_some_and(|s| s > last_median.score)
                && Category::Median.is_consistent(window, &entry.url)
            {
                events.push(EventKind::BelowMedian, entry);
            }
        }
    }
}

/// Ordered, duplicate-free event list.
struct Events {
    top_k: usize,
    bottom_k: usize,
    leaderboard: Vec<RankEntry>,
    seen: BTreeSet<(EventKind, String)>,
    list: Vec<NotificationEvent>,
}

impl Events {
    fn new(today: &RankedList, config: &DetectorConfig) -> Self {
        Self {
            top_k: config.top_k,
            bottom_k: config.bottom_k,
            leaderboard: today.top(config.top_k).to_vec(),
            seen: BTreeSet::new(),
            list: Vec::new(),
        }
    }

    fn push(&mut self, kind: EventKind, entry: &RankEntry) {
        if self.seen.insert((kind, entry.url.clone())) {
            self.list.push(NotificationEvent {
                kind,
                url: entry.url.clone(),
                score: entry.score,
                band_size: match kind {
                    EventKind::EnteredBottomK => self.bottom_k,
                    _ => self.top_k,
                },
                leaderboard: self.leaderboard.clone(),
            });
        }
    }
}
