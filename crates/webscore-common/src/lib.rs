//! Domain types shared by every webscore crate: the metric catalog entry,
//! per-URL samples and aggregated rows, ranked leaderboards and the
//! notification events raised from them.

pub mod slug;
pub mod types;
