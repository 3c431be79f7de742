use std::time::Duration;
use webscore_storage::StorageError;

/// Reasons a metric fetch degrades to empty results.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Fetch: query did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Fetch: {0}")]
    Store(#[from] StorageError),
}
