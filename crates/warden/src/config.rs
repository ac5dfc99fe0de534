//! Configuration management for the warden CLI.
//!
//! Configuration is loaded from `~/.warden/config.toml` (or `$WARDEN_DIR`)
//! with defaults for anything unset.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// User the CLI operates as
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Monitoring settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Paths
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Stall detection threshold in seconds
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold_secs: i64,

    /// Maximum scrollback lines to capture
    #[serde(default = "default_scrollback_lines")]
    pub scrollback_lines: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for warden data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_user_id() -> String {
    "default".to_string()
}

fn default_stall_threshold() -> i64 {
    300
}

fn default_scrollback_lines() -> u32 {
    warden_core::monitor::DEFAULT_SCROLLBACK_LINES
}

fn warden_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WARDEN_DIR") {
        return PathBuf::from(dir);
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".warden")
}

fn default_data_dir() -> PathBuf {
    warden_dir().join("cli")
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stall_threshold_secs: default_stall_threshold(),
            scrollback_lines: default_scrollback_lines(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            monitoring: MonitoringConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    pub fn load() -> Result<Self> {
        let path = warden_dir().join("config.toml");
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.user_id, "default");
        assert_eq!(config.monitoring.stall_threshold_secs, 300);
        assert_eq!(config.monitoring.scrollback_lines, 200);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            user_id = "alice"

            [monitoring]
            stall_threshold_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.monitoring.stall_threshold_secs, 120);
        // Unset fields fall back.
        assert_eq!(config.monitoring.scrollback_lines, 200);
    }
}
