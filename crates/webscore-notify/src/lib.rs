//! Delivery of ranking events to site owners.
//!
//! Events are rendered by [`template`] and handed to every registered
//! [`NotificationChannel`] once per active subscriber by the
//! [`dispatcher::Dispatcher`]. Built-in channels are SMTP email and a
//! logging channel used when email is disabled.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod template;


use anyhow::Result;
use async_trait::async_trait;
use webscore_common::types::NotificationEvent;

/// A delivery channel for ranking events.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers `event` to a single recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after retries (if applicable).
    async fn send(&self, event: &NotificationEvent, recipient: &str) -> Result<()>;

    /// Returns the channel type name (e.g., `"email"`, `"log"`).
    fn channel_name(&self) -> &str;
}
