use std::collections::HashSet;
use webscore_common::types::{RankEntry, RankedList, UrlRow, UNKNOWN_SCORE};

/// Which scores a leaderboard keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMode {
    /// Everything with a computable score. Used for snapshots.
    Inclusive,
    /// Also drops the unknown score. Used for ranking and alerting.
    Exclusive,
}

impl RankMode {
    fn keeps(self, score: i64) -> bool {
        match self {
            RankMode::Inclusive => true,
            RankMode::Exclusive => score != UNKNOWN_SCORE,
        }
    }
}

/// Builds a score-descending leaderboard from `(url, score)` pairs.
///
/// Pairs without a score are dropped. Equal scores keep their input order
/// and only the first pair for a given url is kept.
///
/// # Examples
///
/// ```
/// use webscore_score::leaderboard::{rank, RankMode};
///
/// let list = rank([("a", Some(10)), ("b", Some(-1)), ("c", Some(20))], RankMode::Exclusive);
/// let urls: Vec<&str> = list.iter().map(|e| e.url.as_str()).collect();
/// assert_eq!(urls, ["c", "a"]);
/// ```
pub fn rank<I, S>(entries: I, mode: RankMode) -> RankedList
where
    I: IntoIterator<Item = (S, Option<i64>)>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut ranked: Vec<RankEntry> = entries
        .into_iter()
        .map(|(url, score)| (url.into(), score))
        .filter(|(url, _)| seen.insert(url.clone()))
        .filter_map(|(url, score)| {
            score
                .filter(|s| mode.keeps(*s))
                .map(|score| RankEntry { url, score })
        })
        .collect();
    // stable: ties keep discovery order
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    RankedList::new(ranked)
}

/// Ranks aggregated rows by their composite score.
pub fn rank_rows(rows: &[UrlRow], mode: RankMode) -> RankedList {
    rank(rows.iter().map(|row| (row.url.as_str(), row.score)), mode)
}
