use crate::error::Result;
use crate::{with_timeout, Point, PointQuery, TimeSeriesStore, DEFAULT_CALL_TIMEOUT};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use webscore_common::types::SubscriberMap;

pub const SUBSCRIPTION_MEASUREMENT: &str = "application-emails";

/// Append-only subscription log: each write records the latest state of one
/// (url, email) pair.
pub struct SubscriberRegistry {
    store: Arc<dyn TimeSeriesStore>,
    database: String,
    timeout: std::time::Duration,
}

impl SubscriberRegistry {
    pub fn new(store: Arc<dyn TimeSeriesStore>, database: impl Into<String>) -> Self {
        Self {
            store,
            database: database.into(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn update_subscription(
        &self,
        url: &str,
        email: &str,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let point = Point {
            measurement: SUBSCRIPTION_MEASUREMENT.to_string(),
            tags: BTreeMap::from([
                ("url".to_string(), url.to_string()),
                ("email".to_string(), email.to_string()),
                ("active".to_string(), if active { "1" } else { "0" }.to_string()),
            ]),
            fields: BTreeMap::from([("date".to_string(), at.timestamp_millis() as f64)]),
            timestamp: at,
        };

        match with_timeout(self.timeout, self.store.write_points(&self.database, &[point])).await {
            Ok(()) => {
                tracing::info!(url, email, active, "Saved subscription");
                Ok(())
            }
            Err(e) => {
                tracing::error!(url, email, error = %e, "Failed to save subscription");
                Err(e)
            }
        }
    }

    /// Current state of every subscription. Later writes win.
    ///
    /// A read failure is logged and yields an empty map.
    pub async fn load(&self) -> SubscriberMap {
        let query = PointQuery {
            database: self.database.clone(),
            measurement: SUBSCRIPTION_MEASUREMENT.to_string(),
            since: None,
        };
        let points = match with_timeout(self.timeout, self.store.query_points(&query)).await {
            Ok(points) => points,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load subscriptions");
                return SubscriberMap::new();
            }
        };

        let mut subscribers = SubscriberMap::new();
        for point in points {
            let (Some(url), Some(email)) = (point.tags.get("url"), point.tags.get("email")) else {
                continue;
            };
            let active = matches!(
                point.tags.get("active").map(String::as_str),
                Some("1" | "true")
            );
            subscribers
                .entry(url.clone())
                .or_default()
                .insert(email.clone(), active);
        }
        subscribers
    }
}
