//! Typed engine configuration.
//!
//! Built from a [`SettingsSnapshot`]; every key is optional and falls
//! back to the defaults below.
//!
//! | key                          | default                 |
//! |------------------------------|-------------------------|
//! | `workspace.quota.cpu`        | `2`                     |
//! | `workspace.quota.memory`     | `4Gi`                   |
//! | `workspace.quota.instances`  | `2`                     |
//! | `labels.target.key`          | `pws.dev/target`        |
//! | `labels.target.value`        | `default`               |
//! | `grant.name`                 | `pws-manage-templates`  |
//! | `grant.cluster_role`         | `pws-manage-templates`  |
//! | `retry.base_secs`            | `1`                     |
//! | `retry.max_secs`             | `300`                   |

use anyhow::Context;
use pws_core::{ConfigError, Quantity, Settings, SettingsSnapshot, WorkspaceQuota};

use crate::retry::RetryPolicy;

pub const DEFAULT_CPU: &str = "2";
pub const DEFAULT_MEMORY: &str = "4Gi";
pub const DEFAULT_INSTANCES: u32 = 2;

pub const WORKSPACE_TYPE_LABEL: &str = "pws.dev/type";
pub const PERSONAL_WORKSPACE_TYPE: &str = "personal";
pub const MANAGED_BY_LABEL: &str = "pws.dev/managed-by";
pub const MANAGED_BY_TENANT: &str = "tenant";

pub const DEFAULT_TARGET_LABEL_KEY: &str = "pws.dev/target";
pub const DEFAULT_TARGET_LABEL_VALUE: &str = "default";
pub const DEFAULT_GRANT_NAME: &str = "pws-manage-templates";

/// Prefix for environment overrides, e.g. `PWS__WORKSPACE__QUOTA__CPU`.
pub const ENV_PREFIX: &str = "PWS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quota every personal workspace is created with.
    pub quota: WorkspaceQuota,
    /// Added to every object the engine manages.
    pub target_label: Label,
    /// Name of the grant in each private namespace.
    pub grant_name: String,
    /// Cluster role the grant binds to.
    pub cluster_role: String,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quota: WorkspaceQuota {
                cpu: Quantity::parse(DEFAULT_CPU).expect("default cpu quantity is valid"),
                memory: Quantity::parse(DEFAULT_MEMORY).expect("default memory quantity is valid"),
                instances: DEFAULT_INSTANCES,
            },
            target_label: Label {
                key: DEFAULT_TARGET_LABEL_KEY.to_string(),
                value: DEFAULT_TARGET_LABEL_VALUE.to_string(),
            },
            grant_name: DEFAULT_GRANT_NAME.to_string(),
            cluster_role: DEFAULT_GRANT_NAME.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_snapshot(snapshot: &SettingsSnapshot) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = snapshot.get_non_empty("workspace.quota.cpu")? {
            config.quota.cpu = quantity("workspace.quota.cpu", &raw)?;
        }
        if let Some(raw) = snapshot.get_non_empty("workspace.quota.memory")? {
            config.quota.memory = quantity("workspace.quota.memory", &raw)?;
        }
        if let Some(instances) = snapshot.get_u32("workspace.quota.instances")? {
            config.quota.instances = instances;
        }
        if let Some(key) = snapshot.get_non_empty("labels.target.key")? {
            config.target_label.key = key;
        }
        if let Some(value) = snapshot.get_non_empty("labels.target.value")? {
            config.target_label.value = value;
        }
        if let Some(name) = snapshot.get_non_empty("grant.name")? {
            config.grant_name = name;
        }
        if let Some(role) = snapshot.get_non_empty("grant.cluster_role")? {
            config.cluster_role = role;
        }
        if let Some(base) = snapshot.get_duration_secs("retry.base_secs")? {
            config.retry.base = base;
        }
        if let Some(max) = snapshot.get_duration_secs("retry.max_secs")? {
            config.retry.max = max;
        }
        if config.retry.base > config.retry.max {
            return Err(ConfigError::invalid(
                "retry.base_secs",
                &config.retry.base.as_secs().to_string(),
                "must not exceed retry.max_secs",
            ));
        }

        Ok(config)
    }

    /// Defaults overridden by `PWS__*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut settings = Settings::new();
        let loaded = settings.load_env(ENV_PREFIX);
        tracing::debug!("Loaded {} settings from the environment", loaded);
        Self::from_snapshot(&settings.snapshot()).context("invalid personal workspace settings")
    }
}

fn quantity(key: &str, raw: &str) -> Result<Quantity, ConfigError> {
    Quantity::parse(raw).map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_match_the_documented_table() {
        let config = EngineConfig::from_snapshot(&Settings::new().snapshot()).unwrap();

        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.quota.cpu.as_str(), "2");
        assert_eq!(config.quota.memory.as_str(), "4Gi");
        assert_eq!(config.quota.instances, 2);
        assert_eq!(config.grant_name, "pws-manage-templates");
        assert_eq!(config.retry.max, Duration::from_secs(300));
    }

    #[test]
    fn overrides_are_applied() {
        let mut settings = Settings::new();
        settings.set("workspace.quota.cpu", "500m");
        settings.set("workspace.quota.instances", "5");
        settings.set("labels.target.value", "staging");
        settings.set("retry.max_secs", "30");

        let config = EngineConfig::from_snapshot(&settings.snapshot()).unwrap();

        assert_eq!(config.quota.cpu.as_str(), "500m");
        assert_eq!(config.quota.instances, 5);
        assert_eq!(config.target_label.value, "staging");
        assert_eq!(config.target_label.key, DEFAULT_TARGET_LABEL_KEY);
        assert_eq!(config.retry.max, Duration::from_secs(30));
    }

    #[test]
    fn invalid_quantities_are_rejected() {
        let mut settings = Settings::new();
        settings.set("workspace.quota.memory", "four gigs");

        let err = EngineConfig::from_snapshot(&settings.snapshot()).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "workspace.quota.memory"));
    }

    #[test]
    fn base_backoff_cannot_exceed_max() {
        let mut settings = Settings::new();
        settings.set("retry.base_secs", "60");
        settings.set("retry.max_secs", "10");

        assert!(EngineConfig::from_snapshot(&settings.snapshot()).is_err());
    }
}
