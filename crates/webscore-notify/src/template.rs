use std::fmt::Write;
use webscore_common::types::{EventKind, NotificationEvent};

/// Subject and plain-text body of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

fn headline(event: &NotificationEvent) -> (String, String) {
    let url = &event.url;
    let k = event.band_size;
    match event.kind {
        EventKind::FirstPlace => (
            format!("{url} is now first on the webscore leaderboard"),
            "Congratulations, your site has taken first place.".to_string(),
        ),
        EventKind::EnteredTopK => (
            format!("{url} entered the webscore top {k}"),
            format!("Your site is now among the {k} best scoring sites."),
        ),
        EventKind::ExitedTopK => (
            format!("{url} dropped out of the webscore top {k}"),
            format!("Your site is no longer among the {k} best scoring sites."),
        ),
        EventKind::EnteredBottomK => (
            format!("{url} is in the webscore bottom {k}"),
            format!("Your site is now among the {k} lowest scoring sites."),
        ),
        EventKind::AboveMedian => (
            format!("{url} moved above the webscore median"),
            "Your site now scores better than half of the tracked sites.".to_string(),
        ),
        EventKind::BelowMedian => (
            format!("{url} fell below the webscore median"),
            "Your site now scores worse than half of the tracked sites.".to_string(),
        ),
    }
}

/// Renders `event` into an email-ready message listing the current leaders.
pub fn render(event: &NotificationEvent) -> RenderedMessage {
    let (title, summary) = headline(event);
    let subject = format!("[webscore] {title}");

    let mut body = format!("{summary}\n\nSite: {}\nScore: {}\n", event.url, event.score);
    if !event.leaderboard.is_empty() {
        let _ = write!(body, "\nCurrent top {}:\n", event.leaderboard.len());
        for (i, entry) in event.leaderboard.iter().enumerate() {
            // writing into a String cannot fail
            let _ = writeln!(body, "{}. {} ({})", i + 1, entry.url, entry.score);
        }
    }
    RenderedMessage { subject, body }
}
