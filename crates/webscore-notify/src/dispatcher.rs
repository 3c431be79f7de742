use crate::NotificationChannel;
use std::collections::HashSet;
use webscore_common::types::{active_subscribers, EventKind, NotificationEvent, SubscriberMap};

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub events: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Fans events out to the active subscribers of their URL.
pub struct Dispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &[Box<dyn NotificationChannel>] {
        &self.channels
    }

    /// Sends each distinct `(kind, url)` event once per active subscriber and
    /// channel. A failed delivery is logged and does not stop the others.
    pub async fn dispatch(
        &self,
        events: &[NotificationEvent],
        subscribers: &SubscriberMap,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let mut seen: HashSet<(EventKind, &str)> = HashSet::new();

        for event in events {
            if !seen.insert((event.kind, event.url.as_str())) {
                continue;
            }
            summary.events += 1;

            let recipients = active_subscribers(subscribers, &event.url);
            if recipients.is_empty() {
                tracing::debug!(url = %event.url, kind = %event.kind, "No active subscribers");
                continue;
            }

            for recipient in recipients {
                for channel in &self.channels {
                    match channel.send(event, recipient).await {
                        Ok(()) => summary.sent += 1,
                        Err(e) => {
                            summary.failed += 1;
                            tracing::error!(
                                channel = channel.channel_name(),
                                url = %event.url,
                                kind = %event.kind,
                                recipient,
                                error = %e,
                                "Failed to send notification"
                            );
                        }
                    }
                }
            }
        }

        summary
    }
}
