// src/config.rs

//! Aeris configuration file
//!
//! Stored as TOML at `<config dir>/aeris/config.toml`:
//!
//! ```toml
//! default_adapter = "pacman"
//! default_mode = "system"
//! elevation_cache_secs = 600
//! disabled_adapters = ["dnf"]
//!
//! [adapters.pacman]
//! executable_path = "/usr/bin/pacman"
//! ```
//!
//! `AERIS_CONFIG` or `--config` point at a different file.

use crate::error::{Error, Result};
use crate::privilege::{DEFAULT_CACHE_DURATION, PackageMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "AERIS_CONFIG";

/// Default time a plugin call may run before it is killed
pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AerisConfig {
    /// Adapter preferred when a plain package name matches several backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_adapter: Option<String>,

    /// `user` or `system`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<bool>,

    /// Plugin registry index URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_cache_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_timeout_secs: Option<u64>,

    #[serde(default)]
    pub disabled_adapters: Vec<String>,

    /// Aeris-managed adapter settings: adapter id -> key -> value
    #[serde(default)]
    pub adapters: BTreeMap<String, BTreeMap<String, String>>,
}

impl AerisConfig {
    /// Default config path, honoring `AERIS_CONFIG`
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aeris")
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults on error
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if let Some(mode) = &self.default_mode {
            PackageMode::from_str(mode).map_err(|_| {
                Error::Config(format!(
                    "default_mode must be 'user' or 'system', got '{}'",
                    mode
                ))
            })?;
        }
        if let Some(url) = &self.registry_url {
            url::Url::parse(url)
                .map_err(|e| Error::Config(format!("Invalid registry_url '{}': {}", url, e)))?;
        }
        Ok(())
    }

    pub fn default_mode(&self) -> PackageMode {
        self.default_mode
            .as_deref()
            .and_then(|m| PackageMode::from_str(m).ok())
            .unwrap_or_default()
    }

    pub fn elevation_cache_duration(&self) -> Duration {
        self.elevation_cache_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_DURATION)
    }

    pub fn plugin_timeout(&self) -> Duration {
        self.plugin_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PLUGIN_TIMEOUT)
    }

    pub fn is_adapter_disabled(&self, id: &str) -> bool {
        self.disabled_adapters.iter().any(|s| s == id)
    }

    pub fn set_adapter_disabled(&mut self, id: &str, disabled: bool) {
        self.disabled_adapters.retain(|s| s != id);
        if disabled {
            self.disabled_adapters.push(id.to_string());
        }
    }

    pub fn get_adapter_setting(&self, adapter_id: &str, key: &str) -> Option<&str> {
        self.adapters
            .get(adapter_id)
            .and_then(|settings| settings.get(key))
            .map(String::as_str)
    }

    pub fn set_adapter_setting(&mut self, adapter_id: &str, key: &str, value: &str) {
        self.adapters
            .entry(adapter_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Remove a setting; drops the adapter table when it becomes empty
    pub fn remove_adapter_setting(&mut self, adapter_id: &str, key: &str) -> Option<String> {
        let settings = self.adapters.get_mut(adapter_id)?;
        let removed = settings.remove(key);
        if settings.is_empty() {
            self.adapters.remove(adapter_id);
        }
        removed
    }

    /// Settings for one adapter, empty if none are stored
    pub fn adapter_settings(&self, adapter_id: &str) -> BTreeMap<String, String> {
        self.adapters.get(adapter_id).cloned().unwrap_or_default()
    }
}
