use serde::{Deserialize, Serialize};
use std::time::Duration;
use webscore_alert::detector::DetectorConfig;
use webscore_common::types::MetricSpec;
use webscore_storage::bootstrap::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Database holding leaderboard snapshots and subscriptions.
    #[serde(default = "default_leaderboard_database")]
    pub leaderboard_database: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Metric catalog, in the order rows are aggregated.
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_connect_interval_ms")]
    pub connect_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout_secs(),
            connect_attempts: default_connect_attempts(),
            connect_interval_ms: default_connect_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Size of the top and bottom bands.
    #[serde(default = "default_band_size")]
    pub band_size: usize,
    /// Past days that must agree with today before an event fires.
    #[serde(default = "default_consistency_days")]
    pub consistency_days: usize,
    /// Index of today's bucket in the 30-day daily series.
    #[serde(default = "default_reconstruction_anchor")]
    pub reconstruction_anchor: usize,
    /// Do not send `entered_top_k` to a URL that also took first place.
    #[serde(default)]
    pub suppress_leader_entry: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            band_size: default_band_size(),
            consistency_days: default_consistency_days(),
            reconstruction_anchor: default_reconstruction_anchor(),
            suppress_leader_entry: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// When false, notifications are only written to the log.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from: default_from(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_leaderboard_database() -> String {
    "leaderboard".to_string()
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_connect_attempts() -> u32 {
    60
}

fn default_connect_interval_ms() -> u64 {
    1000
}

fn default_band_size() -> usize {
    webscore_alert::detector::DEFAULT_BAND_SIZE
}

fn default_consistency_days() -> usize {
    webscore_alert::window::DEFAULT_CONSISTENCY_DAYS
}

fn default_reconstruction_anchor() -> usize {
    webscore_alert::window::DEFAULT_RECONSTRUCTION_ANCHOR
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from() -> String {
    "webscore@localhost".to_string()
}

fn default_interval_secs() -> u64 {
    7 * 24 * 3600 // weekly
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.store.connect_attempts.max(1),
            interval: Duration::from_millis(self.store.connect_interval_ms),
            timeout: self.query_timeout(),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.store.query_timeout_secs)
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            top_k: self.alert.band_size,
            bottom_k: self.alert.band_size,
            suppress_leader_entry: self.alert.suppress_leader_entry,
        }
    }
}
