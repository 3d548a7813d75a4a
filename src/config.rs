use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DosewatchConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub reminders: ReminderConfig,
    pub stock: StockConfig,
    pub throttle: ThrottleConfig,
    pub family_alert: FamilyAlertConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReminderConfig {
    pub poll_interval_secs: u64,
    pub dedup_window_secs: u64,
    pub missed_dose_grace_mins: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StockConfig {
    pub low_stock_threshold: u32,
    pub expiry_warning_days: i64,
    pub check_interval_mins: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThrottleConfig {
    pub expiry_daily_cap: u32,
    pub expiry_allowed_hours: Vec<u32>,
    pub expiry_min_interval_hours: i64,
    pub stock_min_interval_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FamilyAlertConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_dosewatch_dir()
            .join("dosewatch.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            dedup_window_secs: 300,
            missed_dose_grace_mins: 30,
        }
    }
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10,
            expiry_warning_days: 7,
            check_interval_mins: 60,
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            expiry_daily_cap: 4,
            expiry_allowed_hours: vec![8, 12, 16, 20],
            expiry_min_interval_hours: 3,
            stock_min_interval_hours: 24,
        }
    }
}

impl Default for FamilyAlertConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 10,
        }
    }
}

impl ReminderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    pub fn missed_dose_grace(&self) -> Duration {
        Duration::from_secs(self.missed_dose_grace_mins * 60)
    }
}

/// Returns `~/.dosewatch/`
pub fn default_dosewatch_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dosewatch")
}

/// Returns the default config file path: `~/.dosewatch/config.toml`
pub fn default_config_path() -> PathBuf {
    default_dosewatch_dir().join("config.toml")
}

impl DosewatchConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            DosewatchConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (DOSEWATCH_DB, DOSEWATCH_LOG_LEVEL, DOSEWATCH_FAMILY_ALERT_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DOSEWATCH_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("DOSEWATCH_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("DOSEWATCH_FAMILY_ALERT_URL") {
            self.family_alert.endpoint = Some(val).filter(|v| !v.is_empty());
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
