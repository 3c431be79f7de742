use crate::template::render;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use webscore_common::types::NotificationEvent;

/// Writes rendered notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, event: &NotificationEvent, recipient: &str) -> Result<()> {
        let message = render(event);
        tracing::info!(
            recipient,
            url = %event.url,
            kind = %event.kind,
            subject = %message.subject,
            "Notification (email disabled)"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
