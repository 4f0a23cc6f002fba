//! Typed configuration store
//!
//! Flat key/value state that survives process restarts: sync status, last
//! sync time, the displayed-pairs list, the main currency and the alert
//! configuration. The store is injected into the sync engine and the alert
//! evaluator rather than reached through globals; the JSON file behind it is
//! an implementation detail.

use crate::db::models::Currency;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// Outcome of the last rate sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Ok,
    ServerDown,
    ServerInvalid,
    /// Never synced
    #[default]
    Unknown,
    /// Response was parseable but missing the expected results field
    Invalid,
}

/// Outcome of the one-time currency seed load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyStatus {
    Ok,
    #[default]
    Unknown,
    Invalid,
}

/// User-configured fluctuation alert for one tracked pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub enabled: bool,
    pub from_code: String,
    pub to_code: String,
    /// Rolling-average window in days
    pub period_days: i64,
    /// Fluctuation threshold in percent, exclusive
    pub threshold: f64,
    pub notifications_enabled: bool,
    /// Persisted rolling average, recomputed at most once per day
    #[serde(default)]
    pub rate_average: Option<f64>,
    /// Normalized day the average was last computed
    #[serde(default)]
    pub average_day: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigData {
    #[serde(default)]
    forex_status: SyncStatus,
    #[serde(default)]
    currency_status: CurrencyStatus,
    #[serde(default)]
    last_sync_millis: Option<i64>,
    /// Comma-joined FROM_TO pair strings, as consumed by the sync request
    #[serde(default)]
    sync_pairs: String,
    #[serde(default)]
    main_currency: Option<Currency>,
    #[serde(default)]
    alert: Option<AlertConfig>,
}

/// File-backed configuration store
pub struct ConfigStore {
    path: Option<PathBuf>,
    data: Mutex<ConfigData>,
}

impl ConfigStore {
    /// Open the store in `config_dir`, creating an empty one on first use.
    pub fn open(config_dir: &std::path::Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
            serde_json::from_str(&raw)
                .map_err(|e| AppError::Config(format!("Invalid config file: {e}")))?
        } else {
            ConfigData::default()
        };

        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    /// Store with no backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(ConfigData::default()),
        }
    }

    fn persist(&self, data: &ConfigData) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| AppError::Config(format!("Failed to create config dir: {e}")))?;
            }
            let raw = serde_json::to_string_pretty(data)?;
            fs::write(path, raw)
                .map_err(|e| AppError::Config(format!("Failed to write config: {e}")))?;
        }
        Ok(())
    }

    pub fn forex_status(&self) -> SyncStatus {
        self.data.lock().forex_status
    }

    pub fn set_forex_status(&self, status: SyncStatus) -> Result<()> {
        let mut data = self.data.lock();
        data.forex_status = status;
        self.persist(&data)
    }

    pub fn currency_status(&self) -> CurrencyStatus {
        self.data.lock().currency_status
    }

    pub fn set_currency_status(&self, status: CurrencyStatus) -> Result<()> {
        let mut data = self.data.lock();
        data.currency_status = status;
        self.persist(&data)
    }

    /// Wall-clock completion time of the last successful sync.
    pub fn last_sync_millis(&self) -> Option<i64> {
        self.data.lock().last_sync_millis
    }

    pub fn set_last_sync_millis(&self, millis: i64) -> Result<()> {
        let mut data = self.data.lock();
        data.last_sync_millis = Some(millis);
        self.persist(&data)
    }

    /// The FROM_TO pair strings the sync cycle requests.
    pub fn sync_pairs(&self) -> Vec<String> {
        let data = self.data.lock();
        data.sync_pairs
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn set_sync_pairs(&self, pairs: &[String]) -> Result<()> {
        let mut data = self.data.lock();
        data.sync_pairs = pairs.join(",");
        self.persist(&data)
    }

    /// The user's main currency; US dollar until one is chosen.
    pub fn main_currency(&self) -> Currency {
        self.data
            .lock()
            .main_currency
            .clone()
            .unwrap_or_else(default_main_currency)
    }

    pub fn set_main_currency(&self, currency: Currency) -> Result<()> {
        let mut data = self.data.lock();
        data.main_currency = Some(currency);
        self.persist(&data)
    }

    pub fn alert(&self) -> Option<AlertConfig> {
        self.data.lock().alert.clone()
    }

    pub fn set_alert(&self, alert: AlertConfig) -> Result<()> {
        let mut data = self.data.lock();
        data.alert = Some(alert);
        self.persist(&data)
    }

    /// Persist a freshly computed rolling average for the alert, stamped with
    /// the normalized day it was computed.
    pub fn set_rate_average(&self, average: f64, day: i64) -> Result<()> {
        let mut data = self.data.lock();
        if let Some(alert) = data.alert.as_mut() {
            alert.rate_average = Some(average);
            alert.average_day = Some(day);
        }
        self.persist(&data)
    }

    /// Delete the alert. The rolling average is always removed; the remaining
    /// settings survive only when `keep_settings` is set.
    pub fn clear_alert(&self, keep_settings: bool) -> Result<()> {
        let mut data = self.data.lock();
        if keep_settings {
            if let Some(alert) = data.alert.as_mut() {
                alert.rate_average = None;
                alert.average_day = None;
            }
        } else {
            data.alert = None;
        }
        self.persist(&data)
    }
}

fn default_main_currency() -> Currency {
    Currency {
        id: 0,
        code: "USD".to_string(),
        name: "US Dollar".to_string(),
        symbol: "$".to_string(),
        country_code: "US".to_string(),
        country_name: "United States".to_string(),
        country_flag_url: "https://flagcdn.com/w320/us.png".to_string(),
    }
}
