//! TOML-based application configuration.
//!
//! Stores:
//! - Backend endpoint and request timeout
//! - Session refresh threshold and default access-token lifetime
//! - XP curve parameters
//! - Timezone offset used when encoding reminder end dates
//!
//! Configuration is stored at `~/.config/pawcare/config.toml`.

use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::progression::{LevelCurve, BASE_XP, XP_MULTIPLIER};

/// Remote backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout enforced by the HTTP transport.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Session token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Refresh once the access token has this many seconds left or fewer.
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,
    /// Lifetime assumed when the backend does not report an expiry.
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: u64,
}

/// XP curve settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_base_xp")]
    pub base_xp: u64,
    #[serde(default = "default_xp_multiplier")]
    pub xp_multiplier: f64,
}

/// Reminder encoding settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Offset from UTC, in minutes, of the days picked in the reminder form.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pawcare/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
}

fn default_base_url() -> String {
    "http://localhost:5001/pawcare/us-central1".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_refresh_threshold_secs() -> u64 {
    60
}
fn default_access_token_ttl_secs() -> u64 {
    900
}
fn default_base_xp() -> u64 {
    BASE_XP
}
fn default_xp_multiplier() -> f64 {
    XP_MULTIPLIER
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_threshold_secs: default_refresh_threshold_secs(),
            access_token_ttl_secs: default_access_token_ttl_secs(),
        }
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_xp: default_base_xp(),
            xp_multiplier: default_xp_multiplier(),
        }
    }
}

// chrono durations are bounded by i64 milliseconds.
const MAX_DURATION_SECS: u64 = (i64::MAX / 1000) as u64;

fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

impl SessionConfig {
    pub fn refresh_threshold(&self) -> Duration {
        seconds(self.refresh_threshold_secs)
    }

    pub fn access_token_ttl(&self) -> Duration {
        seconds(self.access_token_ttl_secs)
    }
}

impl ProgressionConfig {
    /// The curve must keep growing: `base_xp > 0` and a finite
    /// `xp_multiplier > 1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_xp == 0 {
            return Err(ConfigError::InvalidValue {
                key: "progression.base_xp".into(),
                message: "must be greater than 0".into(),
            });
        }
        if !self.xp_multiplier.is_finite() || self.xp_multiplier <= 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "progression.xp_multiplier".into(),
                message: format!("{} is not a finite number above 1", self.xp_multiplier),
            });
        }
        Ok(())
    }

    pub fn curve(&self) -> Result<LevelCurve, ConfigError> {
        self.validate()?;
        Ok(LevelCurve::new(self.base_xp, self.xp_multiplier))
    }
}

impl RemindersConfig {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "reminders.utc_offset_minutes".into(),
                message: format!("{} is not a valid UTC offset", self.utc_offset_minutes),
            }
        })
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if it does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving. Returns error if key is
    /// unknown or the value does not fit the field.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.progression.validate()?;
        updated.reminders.offset()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
