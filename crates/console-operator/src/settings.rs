use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::controller::BackoffPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperatorSettings {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub controller: ControllerSettings,
    /// Cluster connection settings
    #[serde(default)]
    pub kube: KubeSettings,
}

impl OperatorSettings {
    pub fn validate(&self) -> Result<(), String> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Controller validations
        if self.controller.backoff_base_ms == 0 {
            return Err("controller.backoff_base_ms must be > 0".into());
        }
        if self.controller.backoff_base_ms > self.controller.backoff_max_ms {
            return Err("controller.backoff_base_ms must be <= controller.backoff_max_ms".into());
        }
        if self.kube.field_manager.trim().is_empty() {
            return Err("kube.field_manager must not be empty".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Seconds between syncs when no event arrives. 0 disables resync.
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_resync_interval_secs() -> u64 {
    600
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    60_000
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl ControllerSettings {
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeSettings {
    /// Field manager recorded on objects the operator writes.
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
}
fn default_field_manager() -> String {
    console_operator_client::kubernetes::DEFAULT_FIELD_MANAGER.into()
}
impl Default for KubeSettings {
    fn default() -> Self {
        Self {
            field_manager: default_field_manager(),
        }
    }
}

pub mod loader {
    use super::OperatorSettings;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default settings file, relative to the working directory.
    pub const DEFAULT_SETTINGS_PATH: &str = "console-operator.toml";

    pub fn load_settings(path: Option<&str>) -> Result<OperatorSettings, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_SETTINGS_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., CONSOLE_OPERATOR__CONTROLLER__BACKOFF_MAX_MS=30000
        builder = builder.add_source(
            Environment::with_prefix("CONSOLE_OPERATOR")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: OperatorSettings = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = OperatorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(
            settings.controller.resync_interval(),
            Some(Duration::from_secs(600))
        );
        assert_eq!(settings.kube.field_manager, "console-operator");
    }

    #[test]
    fn test_zero_resync_disables() {
        let controller = ControllerSettings {
            resync_interval_secs: 0,
            ..ControllerSettings::default()
        };
        assert_eq!(controller.resync_interval(), None);
    }

    #[test]
    fn test_rejects_bad_level() {
        let mut settings = OperatorSettings::default();
        settings.logging.level = "verbose".into();
        assert!(settings.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let mut settings = OperatorSettings::default();
        settings.controller.backoff_base_ms = 10_000;
        settings.controller.backoff_max_ms = 1_000;
        assert!(settings.validate().is_err());
    }
}
