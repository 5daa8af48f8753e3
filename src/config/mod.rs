// pgsentinel/src/config/mod.rs
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::{AppError, Result};
use crate::scheduler::DailySchedule;

// Setting names, read from the process environment (or a .env file).
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";
pub const R2_ENDPOINT_URL: &str = "R2_ENDPOINT_URL";
pub const R2_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
pub const R2_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
pub const R2_BUCKET_NAME: &str = "R2_BUCKET_NAME";
pub const R2_REGION: &str = "R2_REGION";
pub const BACKUP_CRON_HOUR: &str = "BACKUP_CRON_HOUR";
pub const BACKUP_CRON_MINUTE: &str = "BACKUP_CRON_MINUTE";
pub const BACKUP_WORK_DIR: &str = "BACKUP_WORK_DIR";
pub const SENTINEL_BIND_ADDR: &str = "SENTINEL_BIND_ADDR";

const DEFAULT_REGION: &str = "auto";
const DEFAULT_BACKUP_HOUR: u32 = 3;
const DEFAULT_BACKUP_MINUTE: u32 = 0;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// A snapshot of the named settings, taken once at the start of an operation.
#[derive(Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

/// Where an operation gets its settings snapshot from.
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Settings;
}

/// Reads the process environment on every call.
pub struct EnvSettings;

impl SettingsSource for EnvSettings {
    fn load(&self) -> Settings {
        Settings::from_env()
    }
}

impl SettingsSource for Settings {
    fn load(&self) -> Settings {
        self.clone()
    }
}

/// Object store connection settings.
#[derive(Clone, PartialEq)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"****")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

/// Everything a restore needs, validated together before any side effect.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub production_db_url: String,
    pub test_db_url: String,
    pub storage: StorageConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the value for `key`, treating blank values as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Resolves every key in `keys`, in order. Fails with the full list of
    /// missing keys rather than stopping at the first one.
    pub fn require(&self, keys: &[&str]) -> Result<Vec<String>> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|key| self.get(key).is_none())
            .map(|key| key.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(AppError::Configuration { missing });
        }

        Ok(keys
            .iter()
            .filter_map(|key| self.get(key))
            .map(str::to_string)
            .collect())
    }

    pub fn database_url(&self) -> Result<String> {
        let mut values = self.require(&[DATABASE_URL])?;
        Ok(values.remove(0))
    }

    pub fn storage(&self) -> Result<StorageConfig> {
        let values = self.require(&[
            R2_ENDPOINT_URL,
            R2_ACCESS_KEY_ID,
            R2_SECRET_ACCESS_KEY,
            R2_BUCKET_NAME,
        ])?;
        Ok(self.storage_from(values))
    }

    pub fn restore(&self) -> Result<RestoreConfig> {
        let mut values = self.require(&[
            DATABASE_URL,
            TEST_DATABASE_URL,
            R2_ENDPOINT_URL,
            R2_ACCESS_KEY_ID,
            R2_SECRET_ACCESS_KEY,
            R2_BUCKET_NAME,
        ])?;
        let storage_values = values.split_off(2);
        let test_db_url = values.remove(1);
        let production_db_url = values.remove(0);

        Ok(RestoreConfig {
            production_db_url,
            test_db_url,
            storage: self.storage_from(storage_values),
        })
    }

    fn storage_from(&self, values: Vec<String>) -> StorageConfig {
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        StorageConfig {
            endpoint_url: next(),
            access_key_id: next(),
            secret_access_key: next(),
            bucket_name: next(),
            region: self.get(R2_REGION).unwrap_or(DEFAULT_REGION).to_string(),
        }
    }

    pub fn schedule(&self) -> Result<DailySchedule> {
        let hour = self.parse_bounded(BACKUP_CRON_HOUR, DEFAULT_BACKUP_HOUR, 23)?;
        let minute = self.parse_bounded(BACKUP_CRON_MINUTE, DEFAULT_BACKUP_MINUTE, 59)?;
        Ok(DailySchedule::new(hour, minute))
    }

    fn parse_bounded(&self, key: &str, default: u32, max: u32) -> Result<u32> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        let value: u32 = raw.parse().map_err(|_| AppError::InvalidSetting {
            key: key.to_string(),
            reason: format!("'{}' is not a whole number", raw),
        })?;
        if value > max {
            return Err(AppError::InvalidSetting {
                key: key.to_string(),
                reason: format!("{} is outside 0-{}", value, max),
            });
        }
        Ok(value)
    }

    /// Directory for transient dump and download files.
    pub fn work_dir(&self) -> PathBuf {
        self.get(BACKUP_WORK_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let raw = self.get(SENTINEL_BIND_ADDR).unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|_| AppError::InvalidSetting {
            key: SENTINEL_BIND_ADDR.to_string(),
            reason: format!("'{}' is not a socket address", raw),
        })
    }

    #[cfg(test)]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    #[cfg(test)]
    pub fn without(mut self, keys: &[&str]) -> Self {
        for key in keys {
            self.values.remove(*key);
        }
        self
    }
}
