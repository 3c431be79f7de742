//! Consistency-gated ranking alerts.
//!
//! Today's leaderboard is compared with last week's snapshot. Each candidate
//! change is confirmed against a [`window::ConsistencyWindow`] of today plus
//! the reconstructed rankings of the previous days, so a URL that merely
//! flickers across a boundary raises nothing.

pub mod consistency;
pub mod detector;
pub mod window;


pub use consistency::Category;
pub use detector::{DetectorConfig, EventDetector};
pub use window::ConsistencyWindow;
