use crate::error::{Result, StorageError};
use crate::{with_timeout, TimeSeriesStore, DEFAULT_CALL_TIMEOUT};
use std::time::Duration;

/// Bounded, fixed-interval retry used while the store comes up.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
    /// Limit on each attempt; a timed out attempt counts as failed.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 60,
            interval: Duration::from_secs(1),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Creates `name` unless the store already has it.
pub async fn ensure_database(store: &dyn TimeSeriesStore, name: &str) -> Result<()> {
    let names = store.database_names().await?;
    if !names.iter().any(|n| n == name) {
        tracing::info!(database = %name, "Database does not exist, creating it");
        store.create_database(name).await?;
    }
    Ok(())
}

/// Retries [`ensure_database`] until it succeeds or the policy is exhausted.
///
/// # Errors
///
/// Returns [`StorageError::Unavailable`] carrying the last failure once every
/// attempt has failed.
pub async fn connect_with_retry(
    store: &dyn TimeSeriesStore,
    name: &str,
    policy: RetryPolicy,
) -> Result<()> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match with_timeout(policy.timeout, ensure_database(store, name)).await {
            Ok(()) => {
                tracing::info!(database = %name, attempt, "Connected to store");
                return Ok(());
            }
            Err(e) if attempt < policy.attempts => {
                tracing::warn!(attempt, error = %e, "Failed to connect to store, retrying");
                tokio::time::sleep(policy.interval).await;
            }
            Err(e) => {
                tracing::error!(attempts = attempt, error = %e, "Store unavailable, giving up");
                return Err(StorageError::Unavailable {
                    attempts: attempt,
                    last: e.to_string(),
                });
            }
        }
    }
}
