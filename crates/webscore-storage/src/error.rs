/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use webscore_storage::error::StorageError;
///
/// let err = StorageError::UnknownDatabase("leaderboard".to_string());
/// assert!(err.to_string().contains("leaderboard"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The named database has not been created.
    #[error("Storage: database '{0}' not found")]
    UnknownDatabase(String),

    /// Database names map to file names and are restricted to `[A-Za-z0-9_-]`.
    #[error("Storage: invalid database name '{0}'")]
    InvalidDatabaseName(String),

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Tags or fields could not be encoded or decoded.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while managing database files.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking task running a store call panicked or was cancelled.
    #[error("Storage: blocking task failed: {0}")]
    Task(String),

    /// A store call did not finish within its time limit.
    #[error("Storage: call did not finish within {0:?}")]
    Timeout(std::time::Duration),

    /// The store could not be reached within the retry budget.
    #[error("Storage: unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: String },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
