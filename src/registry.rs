// src/registry.rs

//! Remote plugin registry
//!
//! The registry is a TOML index listing installable plugins with download
//! URLs and SHA-256 checksums. Installing a plugin downloads its manifest
//! and executable into the user plugin directory.

use crate::plugin::manifest::{
    MANIFEST_FILE, PLUGIN_EXECUTABLE, PluginManifest, check_host_version,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/pkgforge/aeris-registry/main/registry.toml";

/// Timeout for registry and plugin downloads
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_RETRIES: u32 = 3;

const RETRY_DELAY_MS: u64 = 500;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to fetch {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to parse registry: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Plugin not found in registry: {0}")]
    UnknownPlugin(String),

    #[error("Plugin {id} does not support {arch}")]
    UnsupportedArch { id: String, arch: String },

    #[error("Plugin {0} is not installed")]
    NotInstalled(String),

    #[error("Invalid plugin id: {0:?}")]
    InvalidId(String),

    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub registry: RegistryMeta,
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryMeta {
    pub version: u32,
    pub updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub download_url: String,
    #[serde(default)]
    pub checksum_sha256: String,
    #[serde(default)]
    pub manifest_url: String,
    #[serde(default)]
    pub manifest_checksum_sha256: String,
    #[serde(default)]
    pub repo_url: String,
    /// Empty means every architecture
    #[serde(default)]
    pub architectures: Vec<String>,
    #[serde(default)]
    pub min_host_version: Option<String>,
}

impl PluginEntry {
    pub fn supports_arch(&self, arch: &str) -> bool {
        self.architectures.is_empty() || self.architectures.iter().any(|a| a == arch)
    }

    /// True if the running host satisfies `min_host_version`
    pub fn is_compatible(&self) -> bool {
        match &self.min_host_version {
            Some(min) => check_host_version(&self.id, min, env!("CARGO_PKG_VERSION")).is_ok(),
            None => true,
        }
    }
}

impl Registry {
    pub fn find(&self, id: &str) -> Option<&PluginEntry> {
        self.plugins.iter().find(|p| p.id == id)
    }
}

pub fn parse_registry(text: &str) -> Result<Registry> {
    Ok(toml::from_str(text)?)
}

/// HTTP client with retries for the registry
pub struct RegistryClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl RegistryClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("aeris/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Download {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Download a URL, retrying transport errors but not HTTP error statuses
    pub async fn download_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let download_error = |reason: String| RegistryError::Download {
            url: url.to_string(),
            reason,
        };
        let parsed = url::Url::parse(url).map_err(|e| download_error(e.to_string()))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(parsed.clone()).send().await {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(download_error(format!("HTTP {}", response.status())));
                    }
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|e| download_error(e.to_string()))?;
                    debug!("Downloaded {} bytes from {}", bytes.len(), url);
                    return Ok(bytes.to_vec());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(download_error(format!(
                            "giving up after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!("Download attempt {} for {} failed: {}, retrying", attempt, url, e);
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64))
                        .await;
                }
            }
        }
    }

    pub async fn fetch_registry(&self, url: &str) -> Result<Registry> {
        info!("Fetching plugin registry from {}", url);
        let bytes = self.download_bytes(url).await?;
        let text = String::from_utf8_lossy(&bytes);
        let registry = parse_registry(&text)?;
        info!("Registry lists {} plugin(s)", registry.plugins.len());
        Ok(registry)
    }

    /// Install `entry` into `plugins_dir/<id>`
    pub async fn download_plugin(&self, entry: &PluginEntry, plugins_dir: &Path) -> Result<PathBuf> {
        let arch = std::env::consts::ARCH;
        if !entry.supports_arch(arch) {
            return Err(RegistryError::UnsupportedArch {
                id: entry.id.clone(),
                arch: arch.to_string(),
            });
        }

        validate_plugin_id(&entry.id)?;
        let plugin_dir = plugins_dir.join(&entry.id);
        std::fs::create_dir_all(&plugin_dir)?;

        if !entry.manifest_url.is_empty() {
            let manifest = self.download_bytes(&entry.manifest_url).await?;
            if !entry.manifest_checksum_sha256.is_empty() {
                verify_checksum(&manifest, &entry.manifest_checksum_sha256)?;
            }
            write_atomic(&plugin_dir, MANIFEST_FILE, &manifest, false)?;
        }

        let executable = self.download_bytes(&entry.download_url).await?;
        if !entry.checksum_sha256.is_empty() {
            verify_checksum(&executable, &entry.checksum_sha256)?;
        } else {
            warn!("Plugin {} has no checksum in the registry", entry.id);
        }
        write_atomic(&plugin_dir, PLUGIN_EXECUTABLE, &executable, true)?;

        info!("Installed plugin {} {} to {}", entry.id, entry.version, plugin_dir.display());
        Ok(plugin_dir)
    }
}

/// Fetch the registry with a default client
pub async fn fetch_registry(url: Option<&str>) -> Result<Registry> {
    RegistryClient::new()?
        .fetch_registry(url.unwrap_or(DEFAULT_REGISTRY_URL))
        .await
}

/// Download and install a plugin with a default client
pub async fn download_plugin(entry: &PluginEntry, plugins_dir: &Path) -> Result<PathBuf> {
    RegistryClient::new()?.download_plugin(entry, plugins_dir).await
}

/// Write `name` in `dir` through a temp file so a failed download leaves no partial file
fn write_atomic(dir: &Path, name: &str, data: &[u8], executable: bool) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    if executable {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o755))?;
    }
    tmp.persist(dir.join(name)).map_err(|e| RegistryError::Io(e.error))?;
    Ok(())
}

/// Compare the SHA-256 of `data` with a hex digest, ignoring case
pub fn verify_checksum(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hex::encode(Sha256::digest(data));
    let expected = expected_hex.trim().to_ascii_lowercase();
    if actual != expected {
        return Err(RegistryError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Check that `id` names a single directory under the plugins directory
///
/// Ids come from the registry index and the command line, and both end up
/// joined onto `plugins_dir`.
pub fn validate_plugin_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(RegistryError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Version of an installed plugin, read from its manifest
pub fn installed_plugin_version(plugins_dir: &Path, id: &str) -> Option<String> {
    validate_plugin_id(id).ok()?;
    let content = std::fs::read_to_string(plugins_dir.join(id).join(MANIFEST_FILE)).ok()?;
    let manifest: PluginManifest = toml::from_str(&content).ok()?;
    Some(manifest.adapter.version)
}

/// Delete an installed plugin directory
pub fn remove_plugin(plugins_dir: &Path, id: &str) -> Result<()> {
    validate_plugin_id(id)?;
    let dir = plugins_dir.join(id);
    if !dir.is_dir() {
        return Err(RegistryError::NotInstalled(id.to_string()));
    }
    std::fs::remove_dir_all(&dir)?;
    info!("Removed plugin {} from {}", id, dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"
[registry]
version = 1
updated = "2025-01-10"

[[plugins]]
id = "flatpak"
name = "Flatpak"
version = "0.2.0"
description = "Flatpak applications"
download_url = "https://example.com/flatpak/plugin"
checksum_sha256 = "abc"
architectures = ["x86_64"]

[[plugins]]
id = "future"
name = "Future"
version = "1.0.0"
download_url = "https://example.com/future/plugin"
min_host_version = "99.0.0"
"#;

    #[test]
    fn test_parse_registry() {
        let registry = parse_registry(REGISTRY).unwrap();
        assert_eq!(registry.registry.version, 1);
        assert_eq!(registry.plugins.len(), 2);
        let flatpak = registry.find("flatpak").unwrap();
        assert!(flatpak.supports_arch("x86_64"));
        assert!(!flatpak.supports_arch("aarch64"));
        assert!(flatpak.is_compatible());

        let future = registry.find("future").unwrap();
        assert!(future.supports_arch("aarch64"));
        assert!(!future.is_compatible());
        assert!(future.manifest_url.is_empty());
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn test_parse_registry_rejects_garbage() {
        assert!(matches!(
            parse_registry("plugins = 3"),
            Err(RegistryError::Parse(_))
        ));
    }

    #[test]
    fn test_verify_checksum() {
        // sha256("hello")
        let digest = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert!(verify_checksum(b"hello", digest).is_ok());
        assert!(verify_checksum(b"hello", &digest.to_uppercase()).is_ok());

        let err = verify_checksum(b"hello!", digest).unwrap_err();
        assert!(err.to_string().contains("expected 2cf24dba"));
    }

    #[test]
    fn test_installed_version_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = dir.path().join("demo");
        std::fs::create_dir_all(&plugin).unwrap();
        std::fs::write(
            plugin.join(MANIFEST_FILE),
            "[adapter]\nid = \"demo\"\nname = \"Demo\"\nversion = \"0.3.1\"\n",
        )
        .unwrap();

        assert_eq!(
            installed_plugin_version(dir.path(), "demo").as_deref(),
            Some("0.3.1")
        );
        assert!(installed_plugin_version(dir.path(), "other").is_none());

        remove_plugin(dir.path(), "demo").unwrap();
        assert!(!plugin.exists());
        assert!(matches!(
            remove_plugin(dir.path(), "demo"),
            Err(RegistryError::NotInstalled(_))
        ));
        assert!(matches!(
            remove_plugin(dir.path(), "../etc"),
            Err(RegistryError::InvalidId(_))
        ));
    }

    #[test]
    fn test_validate_plugin_id() {
        for id in ["flatpak", "snap-store", "my_plugin", "plugin.v2"] {
            assert!(validate_plugin_id(id).is_ok(), "{id}");
        }
        for id in ["", ".", "..", "../x", "a/b", "a\\b", ".hidden", "/abs", "x y"] {
            assert!(
                matches!(validate_plugin_id(id), Err(RegistryError::InvalidId(_))),
                "{id}"
            );
        }
    }

    #[test]
    fn test_write_atomic_sets_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        write_atomic(dir.path(), PLUGIN_EXECUTABLE, b"#!/bin/sh\n", true).unwrap();
        let mode = std::fs::metadata(dir.path().join(PLUGIN_EXECUTABLE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    fn entry(id: &str, architectures: Vec<String>) -> PluginEntry {
        PluginEntry {
            id: id.to_string(),
            name: "Odd".to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            download_url: "https://example.invalid/plugin".to_string(),
            checksum_sha256: String::new(),
            manifest_url: String::new(),
            manifest_checksum_sha256: String::new(),
            repo_url: String::new(),
            architectures,
            min_host_version: None,
        }
    }

    #[tokio::test]
    async fn test_unsupported_arch_is_rejected_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let entry = entry("odd", vec!["not-a-real-arch".to_string()]);
        assert!(matches!(
            download_plugin(&entry, dir.path()).await,
            Err(RegistryError::UnsupportedArch { .. })
        ));
        assert!(!dir.path().join("odd").exists());
    }

    #[tokio::test]
    async fn test_traversing_registry_id_touches_nothing() {
        let root = tempfile::tempdir().unwrap();
        let plugins = root.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();

        let entry = entry("../escaped", Vec::new());
        assert!(matches!(
            download_plugin(&entry, &plugins).await,
            Err(RegistryError::InvalidId(_))
        ));
        assert!(!root.path().join("escaped").exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }
}
