// src/plugin/manifest.rs

//! Plugin manifests and discovery
//!
//! A plugin lives in its own directory:
//!
//! ```text
//! <plugins dir>/<id>/manifest.toml
//! <plugins dir>/<id>/plugin
//! ```
//!
//! ```toml
//! [adapter]
//! id = "flatpak"
//! name = "Flatpak"
//! version = "0.2.0"
//! min_host_version = "0.1.0"
//!
//! [capabilities]
//! can_search = true
//! can_install = true
//!
//! [permissions]
//! network = false
//! filesystem = ["~/.local/share/flatpak"]
//! exec_commands = ["flatpak"]
//! ```

use crate::adapter::{Capabilities, ConfigField};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "manifest.toml";
pub const PLUGIN_EXECUTABLE: &str = "plugin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub adapter: AdapterMeta,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub permissions: Permissions,
    /// Settings the plugin accepts, shown by `aeris config`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config: Vec<ConfigField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterMeta {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub min_host_version: Option<String>,
}

/// What a plugin may touch through host calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub network: bool,
    /// Allowed path prefixes; `~/` expands to the home directory
    #[serde(default)]
    pub filesystem: Vec<String>,
    /// Allowed command basenames
    #[serde(default)]
    pub exec_commands: Vec<String>,
}

/// Directories searched for plugins, in priority order
pub fn plugin_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = user_plugin_dir() {
        paths.push(dir);
    }
    paths.push(PathBuf::from("/usr/local/lib/aeris/plugins"));
    paths
}

/// Per-user plugin directory, where registry installs go
pub fn user_plugin_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("aeris").join("plugins"))
}

/// Find plugins in the default search paths
pub fn discover_plugins() -> Vec<(PathBuf, PluginManifest)> {
    discover_plugins_in(&plugin_search_paths())
}

/// Find plugins in `search_dirs`
///
/// When two directories provide the same plugin id, the first one wins.
/// Returned plugin directories are absolute.
pub fn discover_plugins_in(search_dirs: &[PathBuf]) -> Vec<(PathBuf, PluginManifest)> {
    let mut plugins: Vec<(PathBuf, PluginManifest)> = Vec::new();

    for search_dir in search_dirs {
        let Ok(search_dir) = search_dir.canonicalize() else {
            continue;
        };
        let entries = match std::fs::read_dir(&search_dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        for plugin_dir in dirs {
            let manifest_path = plugin_dir.join(MANIFEST_FILE);
            if !manifest_path.is_file() || !plugin_dir.join(PLUGIN_EXECUTABLE).is_file() {
                debug!("Skipping {}: not a plugin directory", plugin_dir.display());
                continue;
            }

            match load_manifest(&manifest_path) {
                Ok(manifest) => {
                    if plugins.iter().any(|(_, m)| m.adapter.id == manifest.adapter.id) {
                        warn!(
                            "Plugin '{}' at {} is shadowed by an earlier one",
                            manifest.adapter.id,
                            plugin_dir.display()
                        );
                        continue;
                    }
                    plugins.push((plugin_dir, manifest));
                }
                Err(e) => warn!(
                    "Failed to load plugin manifest at {}: {}",
                    manifest_path.display(),
                    e
                ),
            }
        }
    }

    plugins
}

/// Read and validate a manifest
pub fn load_manifest(path: &Path) -> Result<PluginManifest> {
    let content = std::fs::read_to_string(path)?;
    let manifest: PluginManifest = toml::from_str(&content)?;

    if manifest.adapter.id.trim().is_empty() {
        return Err(Error::Plugin("Manifest missing adapter.id".to_string()));
    }
    if manifest.adapter.name.trim().is_empty() {
        return Err(Error::Plugin("Manifest missing adapter.name".to_string()));
    }
    if let Some(min) = &manifest.adapter.min_host_version {
        check_host_version(&manifest.adapter.id, min, env!("CARGO_PKG_VERSION"))?;
    }

    Ok(manifest)
}

/// Reject plugins that need a newer host
pub fn check_host_version(plugin_id: &str, min_host_version: &str, host_version: &str) -> Result<()> {
    let required = semver::Version::parse(min_host_version).map_err(|e| {
        Error::Plugin(format!(
            "Plugin '{}' has invalid min_host_version '{}': {}",
            plugin_id, min_host_version, e
        ))
    })?;
    let host = semver::Version::parse(host_version)
        .map_err(|e| Error::Plugin(format!("Invalid host version '{}': {}", host_version, e)))?;
    if required > host {
        return Err(Error::Plugin(format!(
            "Plugin '{}' requires aeris {} or newer (running {})",
            plugin_id, required, host
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[adapter]
id = "demo"
name = "Demo"
version = "0.1.0"

[capabilities]
can_search = true

[permissions]
exec_commands = ["echo"]
"#;

    fn write_plugin(root: &Path, dir_name: &str, manifest: &str) -> PathBuf {
        let dir = root.join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        std::fs::write(dir.join(PLUGIN_EXECUTABLE), "#!/bin/sh\n").unwrap();
        dir
    }

    #[test]
    fn test_load_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = write_plugin(dir.path(), "demo", MANIFEST);
        let manifest = load_manifest(&plugin.join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.adapter.id, "demo");
        assert!(manifest.capabilities.can_search);
        assert!(!manifest.capabilities.can_install);
        assert_eq!(manifest.permissions.exec_commands, vec!["echo"]);
        assert!(!manifest.permissions.network);
    }

    #[test]
    fn test_manifest_requires_id_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "[adapter]\nid = \"\"\nname = \"X\"\nversion = \"1\"\n").unwrap();
        assert!(matches!(load_manifest(&path), Err(Error::Plugin(_))));

        std::fs::write(&path, "[adapter]\nid = \"x\"\nname = \" \"\nversion = \"1\"\n").unwrap();
        assert!(matches!(load_manifest(&path), Err(Error::Plugin(_))));
    }

    #[test]
    fn test_check_host_version() {
        assert!(check_host_version("p", "0.1.0", "0.1.0").is_ok());
        assert!(check_host_version("p", "0.0.9", "0.1.0").is_ok());
        let err = check_host_version("p", "9.0.0", "0.1.0").unwrap_err();
        assert!(err.to_string().contains("requires aeris 9.0.0"));
        assert!(check_host_version("p", "not-a-version", "0.1.0").is_err());
    }

    #[test]
    fn test_discover_skips_incomplete_and_shadowed() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        write_plugin(first.path(), "demo", MANIFEST);
        // manifest without an executable
        let partial = first.path().join("partial");
        std::fs::create_dir_all(&partial).unwrap();
        std::fs::write(partial.join(MANIFEST_FILE), MANIFEST).unwrap();
        // broken manifest
        write_plugin(first.path(), "broken", "not toml [");
        // same id in a later directory
        write_plugin(second.path(), "demo-copy", MANIFEST);

        let found = discover_plugins_in(&[
            first.path().to_path_buf(),
            second.path().to_path_buf(),
            first.path().join("missing"),
        ]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, first.path().canonicalize().unwrap().join("demo"));
    }

    #[test]
    fn test_discovered_dirs_are_absolute() {
        let root = tempfile::tempdir_in(".").unwrap();
        write_plugin(root.path(), "demo", MANIFEST);
        let relative = Path::new(".").join(root.path().file_name().unwrap());

        let found = discover_plugins_in(&[relative]);
        assert_eq!(found.len(), 1);
        assert!(found[0].0.is_absolute());
        assert!(found[0].0.join(PLUGIN_EXECUTABLE).is_file());
    }

    #[test]
    fn test_search_paths_skip_working_directory() {
        assert!(plugin_search_paths().iter().all(|p| p.is_absolute()));
    }
}
