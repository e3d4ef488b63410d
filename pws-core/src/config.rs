//! # Settings
//!
//! A minimal string key/value store in the spirit of `app.set()` /
//! `app.get()`. Typed configuration is read from an immutable
//! [`SettingsSnapshot`], so a reconciliation pass never sees settings
//! change underneath it.
//!
//! ```rust
//! use pws_core::Settings;
//! let mut settings = Settings::new();
//!
//! settings.set("workspace.quota.cpu", "4");
//! settings.set("retry.max_secs", "120");
//!
//! let snapshot = settings.snapshot();
//! assert_eq!(snapshot.get("workspace.quota.cpu"), Some("4"));
//! assert_eq!(snapshot.get_u64("retry.max_secs").unwrap(), Some(120));
//! ```
//!
//! ## Environment overrides
//! `PWS__WORKSPACE__QUOTA__CPU=4` becomes `workspace.quota.cpu = 4`
//! with [`Settings::load_env`].

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("setting {key} has invalid value {value:?}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("setting {0} must not be empty")]
    Empty(String),
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    /// Create an empty settings store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy every `PREFIX__A__B=value` variable into key `a.b`.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(std::env::vars(), prefix)
    }

    /// Same as [`Settings::load_env`] over an explicit variable list.
    pub fn load_vars<I>(&mut self, vars: I, prefix: &str) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        let mut loaded = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(&marker) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsSnapshot {
    map: HashMap<String, String>,
}

impl SettingsSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    /// A present-but-empty value is an error, not a fallback to the default.
    pub fn get_non_empty(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            Some(v) if v.trim().is_empty() => Err(ConfigError::Empty(key.to_string())),
            Some(v) => Ok(Some(v.trim().to_string())),
            None => Ok(None),
        }
    }

    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, ConfigError> {
        self.parse_with(key, |v| v.parse::<u32>().map_err(|e| e.to_string()))
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        self.parse_with(key, |v| v.parse::<u64>().map_err(|e| e.to_string()))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.parse_with(key, |v| v.parse::<bool>().map_err(|e| e.to_string()))
    }

    pub fn get_duration_secs(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.get_u64(key)?.map(Duration::from_secs))
    }

    fn parse_with<T, F>(&self, key: &str, parse: F) -> Result<Option<T>, ConfigError>
    where
        F: FnOnce(&str) -> Result<T, String>,
    {
        match self.get(key) {
            Some(raw) => parse(raw.trim())
                .map(Some)
                .map_err(|reason| ConfigError::invalid(key, raw, reason)),
            None => Ok(None),
        }
    }
}
