use crate::error::{Result, StorageError};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const POINTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS points (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    measurement TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '{}',
    fields TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_points_measurement_time
    ON points(measurement, timestamp);
CREATE INDEX IF NOT EXISTS idx_points_measurement_url_time
    ON points(measurement, url, timestamp);
";

/// Owns one SQLite file per logical database under `data_dir` and caches
/// their connections.
pub struct DatabaseManager {
    data_dir: PathBuf,
    connections: Mutex<HashMap<String, Connection>>,
}

impl DatabaseManager {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// Lock the connections map, recovering from a poisoned Mutex if necessary.
    fn lock_connections(&self) -> MutexGuard<'_, HashMap<String, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn database_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.db"))
    }

    fn open(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(POINTS_SCHEMA)?;
        Ok(conn)
    }

    pub fn create(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let mut conns = self.lock_connections();
        if !conns.contains_key(name) {
            let conn = Self::open(&self.database_path(name))?;
            tracing::info!(database = %name, "Opened database");
            conns.insert(name.to_string(), conn);
        }
        Ok(())
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some(name) = file_name.strip_suffix(".db") {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Runs `f` against an existing database, opening it on first use.
    pub fn with_database<F, R>(&self, name: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        validate_name(name)?;
        let mut conns = self.lock_connections();
        if !conns.contains_key(name) {
            let path = self.database_path(name);
            if !path.exists() {
                return Err(StorageError::UnknownDatabase(name.to_string()));
            }
            conns.insert(name.to_string(), Self::open(&path)?);
        }
        let conn = conns
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownDatabase(name.to_string()))?;
        f(conn)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidDatabaseName(name.to_string()))
    }
}
